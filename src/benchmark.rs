use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrace::Regex;

const EMAIL_PATTERN: &str = r"[\w\.-]+@([\w-]+\.)+[\w-]{2,4}";

fn do_the_work(text: &str, expected: &[&str]) {
    let regex = Regex::new(EMAIL_PATTERN).unwrap();
    let actual: Vec<String> = regex
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    assert_eq!(expected, actual)
}

fn build_input() -> String {
    let mut text = String::new();
    for i in 0..500 {
        text.push_str("Lorem ipsum dolor sit amet, consectetur adipiscing elit. ");
        text.push_str(&format!("Reach person{i} at user{i}@mail-host{i}.example.org "));
        text.push_str("sed do eiusmod tempor incididunt ut labore et dolore. ");
    }
    text
}

fn criterion_benchmark_emails(c: &mut Criterion) {
    let contents = build_input();
    let expected: Vec<&str> = regex::Regex::new(EMAIL_PATTERN)
        .unwrap()
        .find_iter(&contents)
        .map(|m| m.as_str())
        .collect();
    c.bench_function("parse emails", |b| {
        b.iter(|| do_the_work(black_box(&contents), black_box(&expected)))
    });
}

criterion_group!(benches, criterion_benchmark_emails);
criterion_main!(benches);
