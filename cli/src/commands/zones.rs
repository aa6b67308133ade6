use crate::util::print_json;
use rakshak_core::RiskConfig;

pub fn run(config: &RiskConfig) -> i32 {
    print_json(&config.zones)
}
