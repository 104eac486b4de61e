use log::{info, warn};
use num_bigint::BigInt;
use num_traits::{One, Zero};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::bigmath;
use crate::coordinator::types::{CycleError, Endpoint, Event, EventKind};
use crate::protocol::{Reply, Request};

/// The coordinating side of the fleet.
///
/// Holds one persistent connection per worker for the whole run. The write
/// halves stay here; one spawned reader task per connection parses reply
/// lines and forwards them as [`Event`]s into a single channel, so a slow
/// worker can never starve the others during collection.
pub struct Coordinator {
    /// Write halves, indexed by worker. `None` marks a discarded connection.
    workers: Vec<Option<OwnedWriteHalf>>,
    events: mpsc::Receiver<Event>,
    /// Per worker: how many reply streams from aborted cycles are still
    /// owed. A worker answers requests strictly in order, one `done` line
    /// per request, so counting `done`s is enough to resynchronize.
    stale_replies: Vec<u32>,
    reply_timeout: Duration,
}

impl Coordinator {
    /// Opens one connection per endpoint and spawns its reader task.
    ///
    /// Any endpoint that cannot be reached fails the whole run; there are
    /// no partial fleets.
    pub async fn connect(endpoints: &[Endpoint], reply_timeout: Duration) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Event>(100);
        let mut workers = Vec::with_capacity(endpoints.len());
        for (i, endpoint) in endpoints.iter().enumerate() {
            let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
            info!("Connected to worker {} at {}", i, endpoint);
            let (read_half, write_half) = stream.into_split();
            tokio::spawn(read_replies(i, read_half, tx.clone()));
            workers.push(Some(write_half));
        }
        let stale_replies = vec![0; workers.len()];
        Ok(Self {
            workers,
            events: rx,
            stale_replies,
            reply_timeout,
        })
    }

    /// Runs one full dispatch/collect/verify cycle for `n`.
    ///
    /// Failures abort this cycle only: dead connections are discarded,
    /// leftover reply streams from the aborted cycle are skipped later,
    /// and the coordinator stays usable for the next target.
    pub async fn factor(&mut self, n: &BigInt) -> Result<Vec<BigInt>, CycleError> {
        let live: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter_map(|(i, w)| w.as_ref().map(|_| i))
            .collect();
        if live.is_empty() {
            return Err(CycleError::NoWorkers);
        }

        // Validate: n >= 2, and [1, sqrt(n)] must be wide enough to give
        // every worker at least one candidate.
        let root = bigmath::integer_sqrt(n);
        if *n < BigInt::from(2) || root < BigInt::from(live.len()) {
            return Err(CycleError::OutOfRange {
                workers: live.len(),
            });
        }

        // Dispatch one range per live worker.
        let ranges = partition(&root, live.len());
        for (pos, (slot, (low, high))) in live.iter().zip(ranges.iter()).enumerate() {
            let request = Request::Factor {
                n: n.clone(),
                low: low.clone(),
                high: high.clone(),
            };
            if let Err(e) = send_request(&mut self.workers[*slot], &request).await {
                warn!("Dispatch to worker {} failed: {}", slot, e);
                // Workers dispatched to before the failure will still
                // stream replies for this aborted cycle; skip those
                // streams when they arrive.
                for prior in &live[..pos] {
                    self.stale_replies[*prior] += 1;
                }
                return Err(e.into());
            }
        }

        // Collect until every dispatched worker reports done for this n.
        let mut awaiting = vec![false; self.workers.len()];
        for i in &live {
            awaiting[*i] = true;
        }
        let mut pending = live.len();
        let mut factors: Vec<BigInt> = Vec::new();
        let deadline = Instant::now() + self.reply_timeout;

        while pending > 0 {
            let event = match timeout_at(deadline, self.events.recv()).await {
                Err(_) => {
                    // Wedged workers are discarded; their reader tasks die
                    // with the dropped write halves.
                    for (i, waiting) in awaiting.iter().enumerate() {
                        if *waiting {
                            warn!("Worker {} missed the deadline, discarding it", i);
                            self.workers[i] = None;
                        }
                    }
                    return Err(CycleError::Timeout);
                }
                Ok(None) => {
                    // Every reader task has ended; no connection is usable.
                    for slot in &mut self.workers {
                        *slot = None;
                    }
                    return Err(CycleError::NoWorkers);
                }
                Ok(Some(event)) => event,
            };
            match event.kind {
                EventKind::Found { n: m, p }
                    if self.stale_replies[event.worker] == 0
                        && awaiting[event.worker]
                        && m == *n =>
                {
                    factors.push(p)
                }
                EventKind::Done { n: m } => {
                    if self.stale_replies[event.worker] > 0 {
                        // Closing line of a request aborted in an earlier
                        // cycle; the worker's stream is now one request
                        // closer to the current one.
                        self.stale_replies[event.worker] -= 1;
                    } else if awaiting[event.worker] && m == *n {
                        awaiting[event.worker] = false;
                        pending -= 1;
                    }
                }
                EventKind::Disconnected => {
                    self.workers[event.worker] = None;
                    if awaiting[event.worker] {
                        warn!("Worker {} disconnected mid-cycle", event.worker);
                        // The other dispatched workers stay live but still
                        // owe their replies for this aborted cycle.
                        awaiting[event.worker] = false;
                        for (i, waiting) in awaiting.iter().enumerate() {
                            if *waiting && self.workers[i].is_some() {
                                self.stale_replies[i] += 1;
                            }
                        }
                        return Err(CycleError::Connection(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            "worker closed its connection mid-cycle",
                        )));
                    }
                }
                // A stale found line, or a reply for an earlier target;
                // workers are never asked to acknowledge these.
                _ => {}
            }
        }

        // Verify and repair the aggregate.
        Ok(bigmath::reconcile(factors, n)?)
    }

    /// Interactive loop: reads decimal targets from stdin, one per line,
    /// and prints either the factorization or `invalid` for each. An empty
    /// line or end of input ends the loop.
    pub async fn run(mut self) -> io::Result<()> {
        respond("Hello!");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            respond("Please input the number to factor.");
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let Ok(n) = line.parse::<BigInt>() else {
                respond("invalid");
                continue;
            };
            match self.factor(&n).await {
                Ok(factors) => respond(&render(&n, &factors)),
                Err(e) => {
                    warn!("Factoring {} failed: {}", n, e);
                    respond("invalid");
                }
            }
        }
        Ok(())
    }
}

/// Reader task for one connection: parse each reply line into an event.
/// Unparseable lines are ignored. EOF or an I/O error ends the task with a
/// final `Disconnected` event.
async fn read_replies(worker: usize, read_half: OwnedReadHalf, tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let kind = match line.parse::<Reply>() {
                    Ok(Reply::Found { n, p }) => EventKind::Found { n, p },
                    Ok(Reply::Done { n, .. }) => EventKind::Done { n },
                    _ => continue,
                };
                if tx.send(Event { worker, kind }).await.is_err() {
                    return;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    let _ = tx.send(Event {
        worker,
        kind: EventKind::Disconnected,
    })
    .await;
}

/// Writes one request line to a worker, discarding the connection on
/// failure.
async fn send_request(
    slot: &mut Option<OwnedWriteHalf>,
    request: &Request,
) -> io::Result<()> {
    let Some(writer) = slot.as_mut() else {
        return Err(io::Error::new(
            io::ErrorKind::NotConnected,
            "worker connection already discarded",
        ));
    };
    let line = format!("{}\n", request);
    let result = async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
    .await;
    if result.is_err() {
        *slot = None;
    }
    result
}

/// Splits `[1, root]` into `count` contiguous disjoint ranges.
///
/// Each worker gets `q = root / count` candidates; the last range is
/// extended to `root` so floor division can never leave a gap below the
/// true square root.
fn partition(root: &BigInt, count: usize) -> Vec<(BigInt, BigInt)> {
    let one = BigInt::one();
    let mut q = root / count;
    if q.is_zero() {
        q = one.clone();
    }
    let mut ranges = Vec::with_capacity(count);
    let mut low = one.clone();
    for i in 0..count {
        let high = if i == count - 1 {
            root.clone()
        } else {
            &low + &q - &one
        };
        ranges.push((low.clone(), high));
        low += &q;
    }
    ranges
}

/// Renders `n=p1*p2*...`. A single-factor result is printed as `n=p*1` to
/// make the multiplicative identity explicit.
fn render(n: &BigInt, factors: &[BigInt]) -> String {
    let joined = factors
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("*");
    if factors.len() == 1 {
        format!("{}={}*1", n, joined)
    } else {
        format!("{}={}", n, joined)
    }
}

fn respond(message: &str) {
    println!(">>> {}", message);
}
