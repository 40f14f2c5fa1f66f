use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    folder: Option<PathBuf>,
    no_audio: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    match lilt::config::log_path() {
        Ok(path) => {
            if let Err(err) = lilt::logging::init_file_logging(&path) {
                eprintln!("logging disabled: {err:#}");
            }
        }
        Err(err) => eprintln!("logging disabled: {err:#}"),
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting lilt");

    lilt::app::run_with_startup(lilt::app::AppStartupOptions {
        folder: args.folder,
        no_audio: args.no_audio,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "--no-audio" => out.no_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            folder => {
                if out.folder.is_some() {
                    anyhow::bail!("only one music folder may be given");
                }
                out.folder = Some(PathBuf::from(folder));
            }
        }
    }
    Ok(out)
}

fn print_help() {
    println!("lilt [FOLDER] [--no-audio]");
    println!("  FOLDER        Music folder to scan (defaults to the last one opened)");
    println!("  --no-audio    Run with a silent output device");
}
