pub mod db;
pub mod setup;

pub use db::{
    ContextDirectory, FileInformationRow, FileRepository, PgContextDirectory, PgFileRepository,
};
pub use setup::setup_database;
