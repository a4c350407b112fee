use cellula::ViewerConfig;

fn main() {
    env_logger::init();

    let config = match ViewerConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = cellula::run(config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
