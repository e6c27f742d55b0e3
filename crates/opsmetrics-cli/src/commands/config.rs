use super::{EndpointArgs, load_config};

pub fn run(args: &EndpointArgs) {
    let config = load_config(args, args.overrides()).redacted();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding config: {e}");
            std::process::exit(1);
        }
    }
}
