use std::{sync::Arc, time::Duration};

use criterion::Criterion;
use rand::Rng;

use batchmetrics::{
    ChannelTransport, Distribution, Processor, ProcessorConfiguration, SendFailure, Sink,
    SystemClock,
};
use tokio_util::sync::CancellationToken;

struct Discard;
impl Sink<SendFailure> for Discard {
    fn accept(&self, _to_sink: SendFailure) {}
}

#[allow(clippy::unwrap_used)]
pub fn add_metric(criterion: &mut Criterion) {
    env_logger::builder().is_test(false).try_init().unwrap();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("should be able to make tokio runtime");

    let (transport, mut receiver) = ChannelTransport::new(128);
    let mut configuration = ProcessorConfiguration::default();
    configuration.flush_interval(Duration::from_millis(100));
    let processor = Arc::new(Processor::with_configuration(
        CancellationToken::new(),
        transport,
        SystemClock,
        configuration,
        Discard,
    ));
    runtime.block_on(async { processor.start_processing() });
    // Stand-in for a network sender
    runtime.spawn(async move { while receiver.recv().await.is_some() {} });

    criterion.bench_function("add_metric", |bencher| {
        let mut rng = rand::thread_rng();
        let processor = processor.clone();
        bencher.iter(move || {
            let shard = rng.gen_range(0..8_u32);
            processor.add_metric(Distribution::observe(
                "bench",
                [format!("shard:{shard}")],
                rng.gen::<f64>(),
            ));
        });
    });

    criterion.bench_function("add_metric_contended", |bencher| {
        let contenders: Vec<_> = (0..3)
            .map(|_| {
                let processor = processor.clone();
                runtime.spawn(async move {
                    loop {
                        processor.add_metric(Distribution::observe("contender", ["busy"], 1));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        let processor = processor.clone();
        bencher.iter(move || {
            processor.add_metric(Distribution::observe("bench", ["contended"], 1));
        });
        for contender in contenders {
            contender.abort();
        }
    });

    runtime.block_on(processor.finish_processing());
}

criterion::criterion_group!(benches, add_metric);
criterion::criterion_main! {
    benches,
}
