use crate::config::Config;
use anyhow::Result;
use surrealdb::{
    Surreal,
    engine::remote::ws::{Client, Ws},
    opt::auth::Root,
};

/// Tables and unique indexes the onboarding flow relies on.
const SCHEMA: &str = "
DEFINE TABLE IF NOT EXISTS profile SCHEMALESS;
DEFINE INDEX IF NOT EXISTS profile_user_id ON TABLE profile FIELDS user_id UNIQUE;
DEFINE INDEX IF NOT EXISTS profile_username ON TABLE profile FIELDS username UNIQUE;
DEFINE INDEX IF NOT EXISTS profile_role ON TABLE profile FIELDS role;
DEFINE TABLE IF NOT EXISTS parent_children SCHEMALESS;
DEFINE INDEX IF NOT EXISTS parent_children_player ON TABLE parent_children FIELDS player_id UNIQUE;
DEFINE INDEX IF NOT EXISTS parent_children_parent ON TABLE parent_children FIELDS parent_id;
";

pub async fn connect_db(cfg: &Config) -> Result<Surreal<Client>> {
    // Surreal expects host:port without scheme for Ws; strip ws:// or wss:// if present.
    let addr = cfg
        .db_url
        .trim_start_matches("ws://")
        .trim_start_matches("wss://")
        .to_string();

    let db = Surreal::new::<Ws>(&addr).await?;
    db.signin(Root {
        username: &cfg.db_user,
        password: &cfg.db_pass,
    })
    .await?;
    db.use_ns(&cfg.db_namespace).use_db(&cfg.db_name).await?;
    apply_schema(&db).await?;
    tracing::info!(
        addr = %addr,
        namespace = %cfg.db_namespace,
        database = %cfg.db_name,
        "connected to surrealdb"
    );
    Ok(db)
}

pub async fn apply_schema(db: &Surreal<Client>) -> Result<()> {
    db.query(SCHEMA).await?.check()?;
    Ok(())
}

pub async fn healthcheck(db: &Surreal<Client>) -> Result<bool> {
    // simple ping via info query
    let mut res = db.query("RETURN 1;").await?;
    let val: Option<i32> = res.take(0)?;
    Ok(val == Some(1))
}
