use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pika_peg::{Grammar, GrowParser, PikaParser};

const GRAMMAR_SRC: &str = r#"
  expr <- expr "+" num | expr "-" num | num ;
  num  <- /[0-9]+/ ;
"#;

fn long_addition_chain(terms: usize) -> String {
  (0..terms).map(|n| n.to_string()).collect::<Vec<_>>().join("+")
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar: Grammar = GRAMMAR_SRC.parse().unwrap();
  let short_input = long_addition_chain(8);
  let long_input = long_addition_chain(64);

  c.bench_function("pika bottom-up, short chain", |b| {
    b.iter(|| PikaParser::new(black_box(&grammar), black_box(short_input.clone())).parse())
  });

  c.bench_function("pika bottom-up, long chain", |b| {
    b.iter(|| PikaParser::new(black_box(&grammar), black_box(long_input.clone())).parse())
  });

  c.bench_function("grow-the-seed, short chain", |b| {
    b.iter(|| GrowParser::new(black_box(&grammar), black_box(short_input.clone())).parse())
  });

  c.bench_function("grow-the-seed, long chain", |b| {
    b.iter(|| GrowParser::new(black_box(&grammar), black_box(long_input.clone())).parse())
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
