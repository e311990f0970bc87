use bratlink::corpus::{Corpus, CorpusConfig};
use bratlink::document::parse_document;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fmt::Write;
use tempfile::TempDir;

/// Synthetic document: `sentences` lines of ten words, one entity per word,
/// an attribute on every entity and one relation per sentence.
fn synthetic_pair(sentences: usize) -> (String, String) {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa"];
    let line = words.join(" ");

    let mut text = String::new();
    let mut ann = String::new();
    let mut offset = 0;
    let mut id = 1;

    for s in 0..sentences {
        if s > 0 {
            text.push('\n');
            offset += 1;
        }
        text.push_str(&line);

        let first = id;
        for word in words {
            let end = offset + word.len();
            let _ = writeln!(ann, "T{id}\tThing {offset} {end}\t{word}");
            let _ = writeln!(ann, "A{id}\tPolarity T{id} Positive");
            offset = end + 1;
            id += 1;
        }
        offset -= 1;
        let _ = writeln!(ann, "R{s}\tNext Arg1:T{first} Arg2:T{}", first + 1);
    }

    (text, ann)
}

fn bench_parse_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_document");

    for sentences in [10usize, 100, 1000] {
        let (text, ann) = synthetic_pair(sentences);
        group.throughput(Throughput::Elements((sentences * 10) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sentences), &sentences, |b, _| {
            b.iter(|| {
                let doc = parse_document("bench", black_box(&text), black_box(&ann))
                    .expect("synthetic document should parse");
                black_box(doc.report().bindings)
            });
        });
    }
    group.finish();
}

fn bench_corpus_load(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let (text, ann) = synthetic_pair(100);
    for i in 0..32 {
        std::fs::write(temp_dir.path().join(format!("{i:03}.txt")), &text).unwrap();
        std::fs::write(temp_dir.path().join(format!("{i:03}.ann")), &ann).unwrap();
    }

    let mut group = c.benchmark_group("corpus_load");
    group.sample_size(10);

    for concurrency in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::new("concurrency", concurrency),
            &concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let config = CorpusConfig {
                            concurrency,
                            ..Default::default()
                        };
                        let corpus = Corpus::load(temp_dir.path(), config).await.unwrap();
                        black_box(corpus.len())
                    })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_parse_document, bench_corpus_load);
criterion_main!(benches);
