use libertree::{ decode, Group };
use std::env;
use std::fs;

const COUNTED_KINDS: [&str; 6] = ["cell", "pin", "bus", "bundle", "timing", "type"];

fn main() {
    clilog::init_stderr_color_debug();
    let args: Vec<String> = env::args().collect();
    assert!(args.len() == 2,
            "Usage: {} <liberty_json_path>", args[0]);

    let json = fs::read_to_string(&args[1])
        .expect("Error reading liberty json file");

    let json: serde_json::Value = match serde_json::from_str(&json) {
        Ok(json) => json,
        Err(e) => panic!("{}", e)
    };
    let tree: Group = decode(&json);

    clilog::info!("LIBERTY JSON {}", args[1]);
    for library in tree.groups("library") {
        clilog::info!("# Library attributes = {}", library.attributes.len());
        for kind in COUNTED_KINDS {
            clilog::info!("# {} = {}", kind, library.count_kind(kind));
        }
    }
}
