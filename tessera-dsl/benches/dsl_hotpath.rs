use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_dsl::{compile, parse_column, SchemaSource};

const SCHEMA_MIN: &str = r#"
mixins:
  timestamps:
    created_at: timestamp_ms not null default now
    updated_at: timestamp_ms not null default now
tables:
  users:
    id: text primary key
    email: text not null unique
    role: enum(admin, member, guest) not null default 'member'
    "...timestamps": true
  posts:
    id: integer primary key
    author_id: text not null -> users.id cascade
    body: json
    published: boolean not null default false
    "...timestamps": true
indexes:
  posts:
    posts_author_idx: author_id, created_at
"#;

fn bench_parse_column(c: &mut Criterion) {
    c.bench_function("dsl/parse_column", |b| {
        b.iter(|| {
            let column = parse_column(
                "author_id",
                black_box("text not null default (lower('x')) -> users.id set-null"),
            );
            black_box(column.references.is_some());
        });
    });
}

fn bench_compile(c: &mut Criterion) {
    let source = SchemaSource::from_yaml(SCHEMA_MIN).expect("parse schema source");

    c.bench_function("dsl/compile_min", |b| {
        b.iter(|| {
            let schema = compile(black_box(&source), "app", 1).expect("compile schema");
            black_box(schema.tables.len());
        });
    });
}

criterion_group!(benches, bench_parse_column, bench_compile);
criterion_main!(benches);
