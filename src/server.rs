use crate::config::Config;
use crate::headless::{HeadlessImageryHost, HeadlessSession, LogPresenter};
use crate::models::observation::ObservationSet;
use crate::reader::reader_for;
use crate::routes::router;
use crate::session::{CLOCK_POLL_INTERVAL, Session};
use crate::settings::SettingsStore;
use crate::traits::Presenter;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub session: Arc<Session>,
    pub presenter: Arc<LogPresenter>,
    pub observations: Option<ObservationSet>,
    pub settings: SettingsStore,
}

pub struct CogtourServer {
    config: Config,
    state: AppState,
}

impl CogtourServer {
    /// Load the catalog and the bundled observations. A catalog that fails to
    /// load leaves the server running with an empty one.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let ramp = config.ndvi_ramp()?;
        let headless = HeadlessSession::new(ramp, HeadlessImageryHost::offline());

        let reader = reader_for(&config.source)?;
        if let Err(e) = headless.session.load(reader.as_ref()).await {
            warn!("Serving without products: {}", e);
        }

        let observations = if config.observations_path.exists() {
            ObservationSet::from_path(&config.observations_path)
        } else {
            info!(
                "{} not found, using the bundled observations",
                config.observations_path.display()
            );
            ObservationSet::bundled()
        };
        let observations = match observations {
            Ok(set) => {
                headless.presenter.set_status(&set.status());
                Some(set)
            }
            Err(e) => {
                warn!("No observations: {}", e);
                None
            }
        };

        let state = AppState {
            session: headless.session,
            presenter: headless.presenter,
            observations,
            settings: SettingsStore::persistent(&config.settings_path),
        };
        Ok(Self { config, state })
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let state = Arc::new(self.state);
        let app = router(state.clone(), &self.config.static_dir);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "listening");

        println!(
            r#"
    🚀 cogtour serving on {}

    🌍 Viewer pages from {}
       → http://{}/

    🛰️ Product catalog (JSON): {}
       → http://{}/api/catalog

    🎨 NDVI legend
       → http://{}/api/styles/ndvi/legend.png
            "#,
            addr,
            self.config.static_dir.display(),
            addr,
            state.session.catalog().summary(),
            addr,
            addr
        );

        let follower = Session::follow_clock(&state.session, CLOCK_POLL_INTERVAL);
        let served = axum::serve(listener, app).await;
        follower.abort();
        served?;
        Ok(())
    }
}
