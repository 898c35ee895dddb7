use crate::seed::{Seeder, run_seeder};
use crate::seeds::{curriculum::CurriculumSeeder, progress::ProgressSeeder};
use colored::*;

mod seed;
mod seeds;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _log_guard = util::logging::init_logging();

    let db = match db::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{} {e}", "Failed to connect to database:".red());
            std::process::exit(1);
        }
    };

    for (seeder, name) in [
        (Box::new(CurriculumSeeder) as Box<dyn Seeder + Send + Sync>, "Curriculum"),
        (Box::new(ProgressSeeder::default()), "StudentProgress"),
    ] {
        run_seeder(&*seeder, name, &db).await;
    }
}
