use futures::FutureExt;
use request_dedup::{Config, ExecuteOptions, RequestDeduplicator, RequestInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Points {
    user: u32,
    total: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    let dedup: RequestDeduplicator<Points, String> = RequestDeduplicator::new(config);
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch_points = |user: u32| {
        let calls = Arc::clone(&calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok(Points { user, total: 1200 })
            }
            .boxed()
        }
    };
    let request = RequestInfo::get("/rest/v1/points?user=1").header("Authorization", "Bearer demo");

    println!("=== Concurrent identical reads ===");
    let start = Instant::now();
    let (a, b, c) = tokio::join!(
        dedup.execute(fetch_points(1), &request, ExecuteOptions::new()),
        dedup.execute(fetch_points(1), &request, ExecuteOptions::new()),
        dedup.execute(fetch_points(1), &request, ExecuteOptions::new()),
    );
    println!("Results: {:?} {:?} {:?}", a?, b?, c?);
    println!(
        "Took {:?} with {} network call(s)",
        start.elapsed(),
        calls.load(Ordering::SeqCst)
    );

    println!("\n=== Cached read ===");
    let start = Instant::now();
    let cached = dedup
        .execute(fetch_points(1), &request, ExecuteOptions::new())
        .await?;
    println!(
        "Cached read took {:?}: user {} has {} points",
        start.elapsed(),
        cached.user,
        cached.total
    );

    println!("\n=== Targeted invalidation ===");
    println!("Cache stats before: {:?}", dedup.cache_stats());
    let removed = dedup.clear_cache_pattern("points");
    println!("Removed {} entries, stats after: {:?}", removed, dedup.cache_stats());
    println!("Dedup stats: {:?}", dedup.dedup_stats());

    Ok(())
}
