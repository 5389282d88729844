//! `yugent providers`: List the built-in provider presets.

use yugent_providers::{Credential, EndpointProfile, PRESETS};

pub fn run() {
    print!("{}", render());
}

fn render() -> String {
    let mut out = String::from("Built-in providers:\n\n");
    for name in PRESETS {
        if let Some(profile) = EndpointProfile::preset(name) {
            let key = match &profile.credential {
                Credential::Env(var) => format!("${var}"),
                Credential::Static(_) => "static key".into(),
                Credential::None => "no key".into(),
            };
            out.push_str(&format!("  {:<10} {:<60} {key}\n", name, profile.url()));
        }
    }
    out.push_str("\nAny other OpenAI-compatible endpoint:\n");
    out.push_str("  provider = \"custom\"\n");
    out.push_str("  base_url = \"http://localhost:11434\"\n");
    out.push_str("  api_key_env = \"YUGENT_API_KEY\"\n");
    out
}
