use clap::Parser;
use std::process;
use std::time::Duration;

use recursor::{Resolver, ResolverConfig};

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// Recursive DNS lookup utility.
///
/// Walks the delegation hierarchy from the root servers and prints the
/// answer rdata, one entry per line: addresses in dotted/colon form,
/// CNAME and NS targets as absolute names, MX as "PREFERENCE EXCHANGE".
///
/// Exits non-zero when there is no answer.
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    domain: String,

    /// Record type to resolve: A, AAAA, CNAME, MX, or NS
    #[clap(default_value = "A", value_parser)]
    qtype: String,

    /// Port to query upstream nameservers on
    #[clap(long, value_parser, default_value_t = 53)]
    upstream_port: u16,

    /// Per-exchange upstream timeout, in milliseconds
    #[clap(long, value_parser, default_value_t = 3000)]
    upstream_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let resolver = Resolver::new(ResolverConfig {
        upstream_port: args.upstream_port,
        exchange_timeout: Duration::from_millis(args.upstream_timeout_ms),
        ..ResolverConfig::default()
    });

    println!(";; QUESTION");
    println!("{}\t{}", args.domain, args.qtype);

    let answers = resolver.resolve(&args.domain, &args.qtype).await;

    println!("\n;; ANSWER");
    if answers.is_empty() {
        println!("; no answer");
        process::exit(1);
    }
    for answer in &answers {
        println!("{answer}");
    }
}
