use dbshell::config::Backend;
use dbshell::launcher;

fn main() {
    launcher::init_tracing();
    let code = launcher::run(Backend::MySql);
    std::process::exit(code);
}
