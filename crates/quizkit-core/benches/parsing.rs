use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizkit_core::formula::{render_formulas, MathMode};
use quizkit_core::gaps::parse_gaps;
use quizkit_core::traits::{FormulaCheck, Typesetter};

struct Echo;

impl Typesetter for Echo {
    fn render(&self, expression: &str, _mode: MathMode) -> anyhow::Result<String> {
        Ok(format!("<math>{expression}</math>"))
    }

    fn validate(&self, _expression: &str) -> FormulaCheck {
        FormulaCheck::ok()
    }
}

fn bench_gap_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("gap_parsing");

    let single = "The sky is [[blue,green,red]]";
    let plain = "No gaps in this sentence at all, just some ordinary prose.";
    let many = {
        let mut s = String::new();
        for i in 0..100 {
            s.push_str(&format!("Word {i} is [[w{i}, d{i}a, d{i}b]] and "));
        }
        s
    };

    group.bench_function("single", |b| {
        b.iter(|| parse_gaps(black_box(single), black_box(",")))
    });

    group.bench_function("plain", |b| {
        b.iter(|| parse_gaps(black_box(plain), black_box(",")))
    });

    group.bench_function("100_gaps", |b| {
        b.iter(|| parse_gaps(black_box(&many), black_box(",")))
    });

    group.finish();
}

fn bench_formula_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula_rendering");

    let inline = "$x^2$ is a square";
    let mixed = "Given $$\\int_0^1 x\\,dx$$ and $a+b$, compute $c$.";
    let many = "$a_i$ + ".repeat(200);

    group.bench_function("inline", |b| {
        b.iter(|| render_formulas(black_box(inline), &Echo))
    });

    group.bench_function("mixed", |b| {
        b.iter(|| render_formulas(black_box(mixed), &Echo))
    });

    group.bench_function("200_spans", |b| {
        b.iter(|| render_formulas(black_box(&many), &Echo))
    });

    group.finish();
}

fn bench_quiz_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("quiz_parsing");

    let small = generate_quiz_toml(5);
    let medium = generate_quiz_toml(50);
    let large = generate_quiz_toml(200);

    for (name, toml) in [("5_questions", &small), ("50_questions", &medium), ("200_questions", &large)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                quizkit_core::parser::parse_quiz_str(
                    black_box(toml),
                    black_box("bench.toml".as_ref()),
                )
            })
        });
    }

    group.finish();
}

fn generate_quiz_toml(n: usize) -> String {
    let mut s = String::from("title = \"Benchmark\"\n");
    for i in 0..n {
        s.push_str(&format!(
            r#"
[[questions]]
id = "choice_{i}"
type = "single_choice"
prompt = "Pick the right one for $x_{i}$"
options = [{{ text = "a", correct = true }}, {{ text = "b" }}, {{ text = "c" }}]

[[questions]]
id = "gaps_{i}"
type = "fill_blank"
prompt = "Fill in"
content = "Value [[{i}]] follows [[prev]] and precedes [[next]]."
"#
        ));
    }
    s
}

criterion_group!(
    benches,
    bench_gap_parsing,
    bench_formula_rendering,
    bench_quiz_parsing
);
criterion_main!(benches);
