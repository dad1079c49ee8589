/// Logway load test suite.
///
/// Drives a running gateway over its HTTP ingress and reports
/// throughput, response-code breakdown, and latency percentiles.
///
/// Usage:
///   logway-loadtest flood           Sustained submission rate with N concurrent senders
///   logway-loadtest burst           Packet bursts with pauses, watching queue behavior
///   logway-loadtest backpressure    Push until the gateway answers 429
///   logway-loadtest soak            Long-duration steady load with periodic stats polling

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::task::JoinSet;

use logway_protocol::status::GatewayStats;

#[derive(Parser)]
#[command(name = "logway-loadtest", about = "Logway gateway load test suite")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Gateway base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080", global = true)]
    gateway: String,
}

#[derive(Subcommand)]
enum Command {
    /// Sustained submission rate with concurrent senders
    Flood {
        /// Number of packets to send
        #[arg(short, long, default_value = "10000")]
        count: u64,
        /// Concurrent senders
        #[arg(long, default_value = "16")]
        concurrency: usize,
        /// Messages per packet
        #[arg(short, long, default_value = "10")]
        messages: usize,
    },
    /// Packet bursts with pauses between them
    Burst {
        /// Number of bursts
        #[arg(short, long, default_value = "10")]
        bursts: u64,
        /// Packets per burst
        #[arg(short, long, default_value = "500")]
        size: u64,
        /// Pause between bursts in milliseconds
        #[arg(short, long, default_value = "1000")]
        pause_ms: u64,
    },
    /// Push serially until the first 429, reporting accepted count
    Backpressure {
        /// Upper bound on attempts
        #[arg(short, long, default_value = "100000")]
        limit: u64,
    },
    /// Steady load with periodic /stats polling
    Soak {
        /// Duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: u64,
        /// Packets per second
        #[arg(short, long, default_value = "100")]
        rate: u64,
    },
}

#[derive(Default)]
struct Tally {
    accepted: AtomicU64,
    throttled: AtomicU64,
    rejected: AtomicU64,
    transport_errors: AtomicU64,
    latencies_us: Mutex<Vec<u64>>,
}

impl Tally {
    fn record(&self, status: Option<u16>, elapsed: Duration) {
        match status {
            Some(200) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                self.latencies_us
                    .lock()
                    .unwrap()
                    .push(elapsed.as_micros() as u64);
            }
            Some(429) => {
                self.throttled.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.transport_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn report(&self, elapsed: Duration) {
        let accepted = self.accepted.load(Ordering::Relaxed);
        let throttled = self.throttled.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let errors = self.transport_errors.load(Ordering::Relaxed);
        let total = accepted + throttled + rejected + errors;

        println!("  packets sent:     {total}");
        println!("  accepted (200):   {accepted}");
        println!("  throttled (429):  {throttled}");
        println!("  rejected (other): {rejected}");
        println!("  transport errors: {errors}");
        println!(
            "  rate:             {:.0} packets/s",
            total as f64 / elapsed.as_secs_f64().max(0.001)
        );

        let mut latencies = self.latencies_us.lock().unwrap();
        if latencies.is_empty() {
            return;
        }
        latencies.sort_unstable();
        let pct = |p: f64| -> f64 {
            let idx = ((latencies.len() - 1) as f64 * p).round() as usize;
            latencies[idx] as f64 / 1000.0
        };
        println!(
            "  ingress latency:  p50 {:.2}ms  p95 {:.2}ms  p99 {:.2}ms  max {:.2}ms",
            pct(0.50),
            pct(0.95),
            pct(0.99),
            pct(1.0)
        );
    }
}

fn packet_body(messages: usize, seq: u64) -> String {
    let msgs: Vec<serde_json::Value> = (0..messages)
        .map(|i| {
            json!({
                "level": "INFO",
                "source": "loadtest",
                "message": format!("packet {seq} line {i}"),
                "metadata": { "seq": seq, "line": i },
            })
        })
        .collect();
    json!({ "agentId": "loadtest", "messages": msgs }).to_string()
}

async fn send_packet(
    client: &reqwest::Client,
    gateway: &str,
    body: String,
    tally: &Tally,
) {
    let started = Instant::now();
    let result = client
        .post(format!("{gateway}/logs"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await;
    let status = result.ok().map(|r| r.status().as_u16());
    tally.record(status, started.elapsed());
}

async fn flood(
    client: reqwest::Client,
    gateway: String,
    count: u64,
    concurrency: usize,
    messages: usize,
) -> anyhow::Result<()> {
    println!("Flood: {count} packets x {messages} messages, {concurrency} senders");

    let tally = Arc::new(Tally::default());
    let next = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let mut senders = JoinSet::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let gateway = gateway.clone();
        let tally = tally.clone();
        let next = next.clone();
        senders.spawn(async move {
            loop {
                let seq = next.fetch_add(1, Ordering::Relaxed);
                if seq >= count {
                    break;
                }
                let body = packet_body(messages, seq);
                send_packet(&client, &gateway, body, &tally).await;
            }
        });
    }
    while senders.join_next().await.is_some() {}

    tally.report(started.elapsed());
    Ok(())
}

async fn burst(
    client: reqwest::Client,
    gateway: String,
    bursts: u64,
    size: u64,
    pause_ms: u64,
) -> anyhow::Result<()> {
    println!("Burst: {bursts} bursts of {size} packets, {pause_ms}ms pauses");

    let tally = Arc::new(Tally::default());
    let started = Instant::now();

    for b in 0..bursts {
        let mut senders = JoinSet::new();
        for i in 0..size {
            let client = client.clone();
            let gateway = gateway.clone();
            let tally = tally.clone();
            senders.spawn(async move {
                let body = packet_body(5, b * size + i);
                send_packet(&client, &gateway, body, &tally).await;
            });
        }
        while senders.join_next().await.is_some() {}

        let throttled = tally.throttled.load(Ordering::Relaxed);
        println!("  burst {}/{bursts} done ({throttled} throttled so far)", b + 1);
        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
    }

    tally.report(started.elapsed());
    Ok(())
}

async fn backpressure(
    client: reqwest::Client,
    gateway: String,
    limit: u64,
) -> anyhow::Result<()> {
    println!("Backpressure: pushing serially until the first 429 (limit {limit})");

    let started = Instant::now();
    let mut accepted = 0u64;
    for seq in 0..limit {
        let response = client
            .post(format!("{gateway}/logs"))
            .header("content-type", "application/json")
            .body(packet_body(1, seq))
            .send()
            .await?;
        match response.status().as_u16() {
            200 => accepted += 1,
            429 => {
                println!(
                    "  first 429 after {accepted} accepted packets ({:.2}s)",
                    started.elapsed().as_secs_f64()
                );
                return Ok(());
            }
            other => anyhow::bail!("unexpected status {other} from gateway"),
        }
    }

    println!("  no 429 within {limit} packets; queue is draining faster than we fill it");
    Ok(())
}

async fn soak(
    client: reqwest::Client,
    gateway: String,
    duration: u64,
    rate: u64,
) -> anyhow::Result<()> {
    println!("Soak: {rate} packets/s for {duration}s");

    let tally = Arc::new(Tally::default());
    let deadline = Instant::now() + Duration::from_secs(duration);
    let started = Instant::now();
    let mut interval =
        tokio::time::interval(Duration::from_micros((1_000_000 / rate.max(1)).max(1)));
    let mut last_poll = Instant::now();
    let mut seq = 0u64;

    while Instant::now() < deadline {
        interval.tick().await;
        let body = packet_body(5, seq);
        seq += 1;
        send_packet(&client, &gateway, body, &tally).await;

        if last_poll.elapsed() >= Duration::from_secs(5) {
            last_poll = Instant::now();
            match poll_stats(&client, &gateway).await {
                Ok(stats) => println!(
                    "  [{:>4}s] queue={} processed={} dropped={} errors={} avg={:.1}ms healthy={}",
                    started.elapsed().as_secs(),
                    stats.queue_size,
                    stats.packets_processed,
                    stats.packets_dropped,
                    stats.errors,
                    stats.avg_latency_ms,
                    stats.healthy_analyzers,
                ),
                Err(err) => println!("  stats poll failed: {err}"),
            }
        }
    }

    tally.report(started.elapsed());
    Ok(())
}

async fn poll_stats(client: &reqwest::Client, gateway: &str) -> anyhow::Result<GatewayStats> {
    let stats = client
        .get(format!("{gateway}/stats"))
        .send()
        .await?
        .json::<GatewayStats>()
        .await?;
    Ok(stats)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let gateway = args.gateway.trim_end_matches('/').to_string();

    match args.command {
        Command::Flood {
            count,
            concurrency,
            messages,
        } => flood(client, gateway, count, concurrency, messages).await,
        Command::Burst {
            bursts,
            size,
            pause_ms,
        } => burst(client, gateway, bursts, size, pause_ms).await,
        Command::Backpressure { limit } => backpressure(client, gateway, limit).await,
        Command::Soak { duration, rate } => soak(client, gateway, duration, rate).await,
    }
}
