use workpool::{global, Config};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Instant;


fn main() -> Result<(), Box<dyn std::error::Error>> {
    workpool::init_logging();
    global::init(Config::default().with_threads(10))?;

    let sum = global::submit_async(|| {
        let (a, b) = (1, 2);
        a + b
    })?;
    println!("{}", sum.wait()?);

    let now = Instant::now();
    let visited = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = std::sync::mpsc::channel();
    let v = visited.clone();
    global::current()?.for_each(
        0..5,
        move |i| {
            v.fetch_add(i, Ordering::Relaxed);
        },
        move |result| {
            let _ = tx.send(result);
        },
    )?;
    rx.recv()??;
    println!(
        "bulk sum: {} elapsed: {:?}",
        visited.load(Ordering::Relaxed),
        now.elapsed()
    );

    global::shutdown();
    Ok(())
}
