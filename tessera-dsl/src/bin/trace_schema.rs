/// Schema Tracer - Shows the flow through Source → Tokens → CanonicalSchema
///
/// Usage: cargo run --bin trace_schema <schema-file> [name] [version]

use std::process;
use tessera_dsl::lexer::tokenize;
use tessera_dsl::source::ColumnSpec;
use tessera_dsl::{compile, SchemaSource};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin trace_schema <schema-file> [name] [version]");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin trace_schema schema/app.yaml app 3");
        process::exit(1);
    }

    let path = &args[1];
    let name = args.get(2).map(String::as_str).unwrap_or("app");
    let version = match args.get(3).map(|v| v.parse::<u32>()) {
        None => 1,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            eprintln!("❌ Invalid version: {}", e);
            process::exit(1);
        }
    };

    println!("╔═══════════════════════════════════════════════════════════════");
    println!("║ SCHEMA DSL TRACER");
    println!("╚═══════════════════════════════════════════════════════════════\n");

    let source = match SchemaSource::from_path(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };

    println!("🔤 TOKENS:");
    for (table, columns) in &source.tables {
        for (column, spec) in columns {
            if let ColumnSpec::Definition(definition) = spec {
                let kinds: Vec<String> = tokenize(definition)
                    .into_iter()
                    .map(|t| t.kind.to_string())
                    .collect();
                println!("  {}.{}: {}", table, column, kinds.join(" "));
            }
        }
    }
    println!();

    match compile(&source, name, version) {
        Ok(schema) => {
            println!("✅ CANONICAL SCHEMA:");
            match serde_json::to_string_pretty(&schema) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("❌ Failed to serialize: {}", e),
            }
        }
        Err(e) => {
            eprintln!("❌ Compile failed: {}", e);
            process::exit(1);
        }
    }
}
