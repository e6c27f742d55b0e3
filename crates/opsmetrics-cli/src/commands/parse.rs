use opsmetrics_core::{AttributeDescriptor, ObjectNamePath, normalize};

pub fn run(identity: &str, attribute: &str, value: f64, platform_instance: &str) {
    let path = match ObjectNamePath::parse(identity) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let descriptor = AttributeDescriptor::parse(attribute);
    let metric = normalize(&path, &descriptor, value, platform_instance);

    match serde_json::to_string_pretty(&metric) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding metric: {e}");
            std::process::exit(1);
        }
    }
}
