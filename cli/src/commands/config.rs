use crate::util::print_json;
use rakshak_core::RiskConfig;

/// `load_config` already validated, so this is the configuration cycles run with.
pub fn run(config: &RiskConfig) -> i32 {
    print_json(config)
}
