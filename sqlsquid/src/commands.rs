use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sqlsquid")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sqlsquid")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log scan internals to stderr").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Crawl from a seed URL, then probe every discovered form with SQL \
                injection payloads.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Seed URL. http:// is assumed when no scheme is given"),
                )
                .arg(
                    arg!(-p --"payloads" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited payload file. Built-in payloads are used when omitted"),
                )
                .arg(
                    arg!(--"max-pages" <N>)
                        .required(false)
                        .help("Maximum number of pages to visit while crawling")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"timeout" <SECS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(-t --"threads" <THREADS>)
                        .required(false)
                        .help("Number of pages probed concurrently")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"sqlmap" <PATH>)
                        .required(false)
                        .help("Path to sqlmap.py. Enables a deep scan of each vulnerable form action"),
                )
                .arg(
                    arg!(--"python" <PROGRAM>)
                        .required(false)
                        .help("Interpreter used to run sqlmap")
                        .default_value("python"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the scan report to a JSON file"),
                )
                .arg(
                    arg!(--"wait" "Wait for outstanding deep scans before exiting")
                        .required(false)
                        .requires("sqlmap"),
                ),
        )
        .subcommand(
            command!("dbs")
                .about("Run sqlmap against a single URL and list the databases it enumerates")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The target URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"sqlmap" <PATH>)
                        .required(true)
                        .help("Path to sqlmap.py"),
                )
                .arg(
                    arg!(--"python" <PROGRAM>)
                        .required(false)
                        .help("Interpreter used to run sqlmap")
                        .default_value("python"),
                ),
        )
}
