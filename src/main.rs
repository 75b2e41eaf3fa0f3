use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

mod args;
use args::Args;

mod auth;
mod backend;
mod grade;
mod identity;
mod page;
mod person;
mod routes;
mod school;

use backend::Backend;
use page::Pages;
use school::School;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    pretty_env_logger::init();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let backend = match Backend::new(args.data_dir()).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("couldn't open database in {}: {e}", args.data_dir().display());
            return ExitCode::FAILURE;
        }
    };
    let school = Arc::new(School::new(backend));

    for path in args.scripts() {
        let script = match tokio::fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) => {
                error!("couldn't read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };

        match school.run_script(&script).await {
            Ok(rows) => info!("ran {}: {rows} rows affected", path.display()),
            Err(_) => return ExitCode::FAILURE,
        }
    }

    let pages = match Pages::new() {
        Ok(pages) => Arc::new(pages),
        Err(e) => {
            error!("couldn't load templates: {e}");
            return ExitCode::FAILURE;
        }
    };

    let routes = routes::routes(school, pages, args.secure());

    info!("listening on {addr}");
    warp::serve(routes).run(addr).await;

    ExitCode::SUCCESS
}
