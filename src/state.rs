use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{jwt::JwtKeys, policy::AutoVerifyPolicy, repo::{PgUserRepo, UserRepo}},
    config::AppConfig,
    db,
    events::{realtime::RsvpBroadcaster, repo::{EventRepo, PgEventRepo}},
    mailer::{HttpMailer, LogMailer, Mailer},
    memory::{MemoryEventRepo, MemoryUserRepo},
    storage::{Storage, StorageClient},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub auto_verify: AutoVerifyPolicy,
    pub users: Arc<dyn UserRepo>,
    pub events: Arc<dyn EventRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Option<Arc<dyn StorageClient>>,
    pub rsvp: RsvpBroadcaster,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let jwt = JwtKeys::new(&config.jwt)?;

        let (users, events): (Arc<dyn UserRepo>, Arc<dyn EventRepo>) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                info!("using postgres store");
                (
                    Arc::new(PgUserRepo::new(pool.clone())),
                    Arc::new(PgEventRepo::new(pool)),
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                (Arc::new(MemoryUserRepo::new()), Arc::new(MemoryEventRepo::new()))
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(HttpMailer::new(mail)?),
            None => {
                warn!("MAIL_API_URL not set; verification emails are only logged");
                Arc::new(LogMailer)
            }
        };

        let storage = match &config.storage {
            Some(cfg) => Some(Arc::new(Storage::new(cfg).await?) as Arc<dyn StorageClient>),
            None => {
                warn!("S3_ENDPOINT not set; image uploads are disabled");
                None
            }
        };

        Ok(Self {
            auto_verify: AutoVerifyPolicy::from_threshold(config.auto_verify_login_threshold),
            rsvp: RsvpBroadcaster::new(config.rsvp_channel_capacity),
            config,
            jwt,
            users,
            events,
            mailer,
            storage,
        })
    }
}
