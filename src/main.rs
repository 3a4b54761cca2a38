use millrace::{Ports, ProjectPaths, cli, logging};

fn main() {
    if let Err(err) = run_main() {
        eprintln!("millrace error: {err:?}");
        std::process::exit(1);
    }
}

fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init(args.log_level);

    let paths = ProjectPaths::with_root(&args.root)?;
    let ports = Ports {
        http: args.port,
        livereload: args.livereload_port,
    };

    let task = args.task.as_deref().unwrap_or("default");
    millrace::run(task, paths, ports, args.overlap.into())?;

    Ok(())
}
