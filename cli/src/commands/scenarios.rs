use crate::util::print_json;

pub fn run() -> i32 {
    print_json(&rakshak_engine::simulation::scenarios())
}
