use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();

    generate_effect_alias_map(&out_dir);

    println!("cargo:rerun-if-changed=data/effect_aliases.csv");
}

fn generate_effect_alias_map(out_dir: &str) {
    let csv = fs::read_to_string("data/effect_aliases.csv")
        .expect("failed to read effect_aliases.csv");

    // BTreeMap for deterministic output (sorted by key)
    let mut entries = BTreeMap::new();
    for line in csv.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((alias, command)) = line.split_once(',') else {
            continue;
        };
        let alias = alias.trim().to_ascii_lowercase();
        let command = command.trim().to_ascii_lowercase();
        if alias.is_empty() || !command.starts_with('/') {
            continue;
        }
        // First occurrence wins so the csv can be read top-down
        entries.entry(alias).or_insert(command);
    }

    let path = Path::new(out_dir).join("effect_aliases.rs");
    let mut file = BufWriter::new(fs::File::create(&path).unwrap());

    let mut builder = phf_codegen::Map::new();
    let quoted: Vec<_> = entries
        .iter()
        .map(|(alias, command)| (alias.as_str(), format!("{:?}", command)))
        .collect();
    for (alias, command) in &quoted {
        builder.entry(*alias, command);
    }

    writeln!(
        file,
        "pub static EFFECT_ALIASES: phf::Map<&'static str, &'static str> = {};",
        builder.build()
    )
    .unwrap();
}
