use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    battlr::app::run(args)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<battlr::app::StartupOptions> {
    let mut out = battlr::app::StartupOptions::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            flag @ ("--root" | "--battle" | "--server" | "--shuffle") => {
                index += 1;
                let Some(value) = args.get(index).map(|value| value.trim()) else {
                    anyhow::bail!("{flag} requires a value");
                };
                if value.is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                match flag {
                    "--root" => out.root = Some(PathBuf::from(value)),
                    "--battle" => out.battle = Some(value.to_string()),
                    "--server" => out.server_url = Some(value.to_string()),
                    _ => out.shuffle_seed = Some(value.to_string()),
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("battlr");
    println!("  --root DIR        Folder whose sub-folders are battles (default: .)");
    println!("  --battle NAME     Battle to open (default: last opened or first found)");
    println!("  --server URL      Vote server base URL");
    println!("  --shuffle SEED    Seed for the entry display order");
}
