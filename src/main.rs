use anyhow::Result;
use kino::{App, Config, GraphicsBackend};
use std::path::PathBuf;

const HELP: &str = "\
kino - terminal media viewer

USAGE:
  kino [OPTIONS] [PATH]

ARGS:
  [PATH]  File or directory to open (default: current directory)

OPTIONS:
  -b, --backend <NAME>  Graphics backend: kitty, sixel, blocks
  -a, --all             Show hidden files
  -h, --help            Print help
  -V, --version         Print version

Logs go to stderr; set RUST_LOG=debug for playback diagnostics.
";

struct Args {
    path: Option<PathBuf>,
    backend: Option<String>,
    show_hidden: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return Ok(None);
    }
    if pargs.contains(["-V", "--version"]) {
        println!("kino {}", env!("CARGO_PKG_VERSION"));
        return Ok(None);
    }

    let args = Args {
        backend: pargs.opt_value_from_str(["-b", "--backend"])?,
        show_hidden: pargs.contains(["-a", "--all"]),
        path: pargs.opt_free_from_str()?,
    };

    let leftover = pargs.finish();
    anyhow::ensure!(
        leftover.is_empty(),
        "unexpected arguments: {:?} (try --help)",
        leftover
    );
    Ok(Some(args))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut config = Config::load()?;
    if let Some(backend) = args.backend {
        anyhow::ensure!(
            GraphicsBackend::from_name(&backend).is_some(),
            "unknown backend '{}' (expected kitty, sixel or blocks)",
            backend
        );
        config.backend = Some(backend);
    }
    if args.show_hidden {
        config.show_hidden = true;
    }

    App::new(config, args.path)?.run()
}
