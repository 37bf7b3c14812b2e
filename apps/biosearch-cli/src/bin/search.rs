use biosearch_cli::init_logging;
use biosearch_core::config::Config;
use biosearch_core::types::{FlagFilter, Query, RangeFilter};
use biosearch_index::PaperIndex;
use biosearch_retrieval::RetrievalGateway;
use std::collections::BTreeMap;
use std::env;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {program} <query terms> [--facet name=value]... \
         [--year-gte N] [--year-lte N] [--has-doi] [--has-osdr] [--limit N]"
    );
    eprintln!("Example: {program} microgravity bone density --facet organism=Mouse --year-gte 2015");
    std::process::exit(1);
}

fn parse_query(program: &str, args: &[String]) -> Query {
    let mut free_text: Vec<&str> = Vec::new();
    let mut facets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut year_gte = None;
    let mut year_lte = None;
    let mut flags = Vec::new();
    let mut page_size = 0;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--facet" => {
                let Some((name, value)) = iter.next().and_then(|v| v.split_once('=')) else {
                    usage(program);
                };
                facets
                    .entry(name.to_string())
                    .or_default()
                    .push(value.to_string());
            }
            "--year-gte" => match iter.next().and_then(|v| v.parse().ok()) {
                Some(year) => year_gte = Some(year),
                None => usage(program),
            },
            "--year-lte" => match iter.next().and_then(|v| v.parse().ok()) {
                Some(year) => year_lte = Some(year),
                None => usage(program),
            },
            "--has-doi" => flags.push(FlagFilter {
                field: "has_doi".to_string(),
                value: true,
            }),
            "--has-osdr" => flags.push(FlagFilter {
                field: "has_osdr".to_string(),
                value: true,
            }),
            "--limit" => match iter.next().and_then(|v| v.parse().ok()) {
                Some(limit) => page_size = limit,
                None => usage(program),
            },
            other if other.starts_with("--") => usage(program),
            other => free_text.push(other),
        }
    }

    let mut ranges = Vec::new();
    if year_gte.is_some() || year_lte.is_some() {
        ranges.push(RangeFilter {
            field: "year".to_string(),
            gte: year_gte,
            lte: year_lte,
        });
    }

    Query {
        free_text: free_text.join(" "),
        facets,
        ranges,
        flags,
        page_size,
        offset: 0,
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }
    let query = parse_query(&args[0], &args[1..]);

    let config = Config::load()?;
    let index = PaperIndex::open(&config.index, &config.recency, &config.search)?;
    let gateway = RetrievalGateway::new(index, config.search.clone());

    let outcome = gateway.retrieve(&query);
    if let Some(reason) = &outcome.degraded {
        eprintln!("search backend unavailable: {reason}");
        std::process::exit(1);
    }
    if outcome.fallback {
        println!("⚠️  Nothing matched; showing the most recent papers instead.");
    }
    println!(
        "🔍 {} matches, showing {}",
        outcome.total,
        outcome.results.len()
    );

    for (rank, result) in outcome.results.iter().enumerate() {
        let doc = &result.document;
        let year = doc.year.map_or_else(|| "n.d.".to_string(), |y| y.to_string());
        println!(
            "\n  {}. score={:.4}  {} ({})",
            rank + 1,
            result.score,
            doc.title,
            year
        );
        if !doc.url.is_empty() {
            println!("     {}", doc.url);
        }
        for fragments in result.highlights.values() {
            for fragment in fragments {
                println!("     📝 {fragment}");
            }
        }
    }

    let facets = gateway.facet_counts()?;
    println!("\n📊 Facets:");
    print_facet("organism", &facets.organisms);
    print_facet("mission", &facets.missions);
    print_facet("environment", &facets.environments);
    print_facet("source", &facets.sources);
    Ok(())
}

fn print_facet(name: &str, counts: &[(String, u64)]) {
    if counts.is_empty() {
        return;
    }
    let listing: Vec<String> = counts
        .iter()
        .take(5)
        .map(|(value, count)| format!("{value} ({count})"))
        .collect();
    println!("  {name}: {}", listing.join(", "));
}
