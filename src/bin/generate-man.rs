// Render the callq man page to stdout: `generate-man > callq.1`

use callq::cli::Cli;
use clap::CommandFactory;

fn main() -> std::io::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut out = std::io::stdout();
    man.render(&mut out)
}
