//! Headless Chrome render backend
//!
//! One browser process is launched per crawl. Each render opens a fresh
//! incognito browser context, listens to the Network domain while the page
//! loads, and waits until the network has been quiet for the configured idle
//! window before serializing the DOM.

use crate::config::RenderConfig;
use crate::render::links::extract_links_simple;
use crate::render::{
    millis, CapturedResource, RenderBackend, RenderContext, RenderError, RenderedPage,
    RESOURCE_CHANNEL_CAPACITY,
};
use crate::url::{same_origin_links, Origin};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, RequestId, ResourceType,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::{FutureExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use url::Url;

const CHROME_ARGS: &[&str] = &["--disable-setuid-sandbox", "--disable-dev-shm-usage"];

/// Requests allowed in flight while the network still counts as idle
const ACTIVE_REQUEST_ALLOWANCE: usize = 2;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

const LINK_SCRIPT: &str = "Array.from(document.querySelectorAll('a[href]'), a => a.href)";

/// Backend driving a headless Chrome process
pub struct ChromeBackend {
    config: RenderConfig,
}

impl ChromeBackend {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RenderBackend for ChromeBackend {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn launch(&self) -> Result<Arc<dyn RenderContext>, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(millis(self.config.navigation_timeout));
        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler error: {}", e);
                }
            }
        });

        tracing::debug!("Launched headless Chrome");

        Ok(Arc::new(ChromeContext {
            browser: RwLock::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            config: self.config.clone(),
        }))
    }
}

struct ChromeContext {
    browser: RwLock<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    config: RenderConfig,
}

#[async_trait]
impl RenderContext for ChromeContext {
    async fn render(&self, url: &Url, origin: &Origin) -> Result<RenderedPage, RenderError> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(RenderError::ContextClosed)?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(cdp_error)?
            .result
            .browser_context_id
            .clone();

        let result = self.render_isolated(browser, &context_id, url, origin).await;

        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            tracing::warn!("Failed to dispose browser context for {}: {}", url, e);
        }

        result
    }

    async fn close(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.abort_handler();
    }
}

impl ChromeContext {
    async fn render_isolated(
        &self,
        browser: &Browser,
        context_id: &BrowserContextId,
        url: &Url,
        origin: &Origin,
    ) -> Result<RenderedPage, RenderError> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(RenderError::Browser)?;
        let page = browser.new_page(target).await.map_err(cdp_error)?;

        let result = self.render_page(&page, url, origin).await;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        result
    }

    async fn render_page(
        &self,
        page: &Page,
        url: &Url,
        origin: &Origin,
    ) -> Result<RenderedPage, RenderError> {
        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await
        .map_err(cdp_error)?;
        page.execute(EnableParams::default())
            .await
            .map_err(cdp_error)?;

        let activity = Arc::new(NetworkActivity::new());
        let (resource_tx, mut resource_rx) = mpsc::channel(RESOURCE_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();

        let capture = spawn_capture(page, Arc::clone(&activity), resource_tx, stop_rx).await?;
        let collector = tokio::spawn(async move {
            let mut resources = Vec::new();
            while let Some(resource) = resource_rx.recv().await {
                resources.push(resource);
            }
            resources
        });

        let loaded = self.load(page, url, &activity).await;

        let _ = stop_tx.send(());
        if let Err(e) = capture.await {
            tracing::debug!("Network capture task for {} ended abnormally: {}", url, e);
        }
        let mut resources = collector.await.unwrap_or_default();

        let (content, raw_links) = loaded?;
        resources.push(CapturedResource::new(
            url.clone(),
            content.clone().into_bytes(),
        ));

        Ok(RenderedPage {
            links: same_origin_links(&raw_links, origin),
            content,
            resources,
        })
    }

    /// Navigates, waits for the network to settle, and reads the final DOM
    async fn load(
        &self,
        page: &Page,
        url: &Url,
        activity: &NetworkActivity,
    ) -> Result<(String, Vec<String>), RenderError> {
        let navigation_timeout = millis(self.config.navigation_timeout);
        match tokio::time::timeout(navigation_timeout, page.goto(url.as_str())).await {
            Err(_) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    after: navigation_timeout,
                })
            }
            Ok(Err(e)) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }

        ensure_document_ok(url, activity.document_status())?;
        self.wait_for_network_idle(url, activity).await?;

        let content = page.content().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let links = match page.evaluate(LINK_SCRIPT).await {
            Ok(result) => result.into_value::<Vec<String>>().unwrap_or_else(|e| {
                tracing::debug!("Unexpected link list for {}: {}", url, e);
                extract_links_simple(&content, url)
            }),
            Err(e) => {
                tracing::debug!("Link evaluation failed for {}: {}", url, e);
                extract_links_simple(&content, url)
            }
        };

        Ok((content, links))
    }

    async fn wait_for_network_idle(
        &self,
        url: &Url,
        activity: &NetworkActivity,
    ) -> Result<(), RenderError> {
        let idle_window = millis(self.config.network_idle);
        let settle_timeout = millis(self.config.settle_timeout);

        let settle = async {
            while !activity.is_idle(idle_window) {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(settle_timeout, settle)
            .await
            .map_err(|_| {
                tracing::debug!(
                    "Network of {} never settled, {} requests in flight",
                    url,
                    activity.in_flight()
                );
                RenderError::Timeout {
                    url: url.to_string(),
                    after: settle_timeout,
                }
            })
    }

    fn abort_handler(&self) {
        let mut slot = self
            .handler_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

impl Drop for ChromeContext {
    fn drop(&mut self) {
        self.abort_handler();
    }
}

/// Subscribes to Network events and spawns the task that consumes them
///
/// Listeners are registered before returning so that no event of the
/// upcoming navigation is missed.
async fn spawn_capture(
    page: &Page,
    activity: Arc<NetworkActivity>,
    resource_tx: mpsc::Sender<CapturedResource>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<JoinHandle<()>, RenderError> {
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(cdp_error)?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(cdp_error)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(cdp_error)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(cdp_error)?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    // Responses that finished before the stop signal still count
                    while let Some(Some(event)) = finished.next().now_or_never() {
                        if !forward_body(&page, &activity, &resource_tx, &event).await {
                            break;
                        }
                    }
                    break;
                }
                Some(event) = requests.next() => {
                    activity.request_started(event.request_id.inner());
                }
                Some(event) = responses.next() => {
                    activity.response_received(
                        event.request_id.inner(),
                        &event.response.url,
                        event.r#type == ResourceType::Document,
                        event.response.status,
                    );
                }
                Some(event) = finished.next() => {
                    if !forward_body(&page, &activity, &resource_tx, &event).await {
                        break;
                    }
                }
                Some(event) = failed.next() => {
                    activity.request_failed(event.request_id.inner());
                }
                else => break,
            }
        }
    }))
}

/// Reads the body of a finished response and hands it to the collector
///
/// Returns false once the collector is gone.
async fn forward_body(
    page: &Page,
    activity: &NetworkActivity,
    resource_tx: &mpsc::Sender<CapturedResource>,
    event: &EventLoadingFinished,
) -> bool {
    let Some(url) = activity.request_finished(event.request_id.inner()) else {
        return true;
    };

    match fetch_body(page, event.request_id.clone()).await {
        Ok(body) => resource_tx
            .send(CapturedResource::new(url, body))
            .await
            .is_ok(),
        Err(e) => {
            tracing::trace!("No body for {}: {}", url, e);
            true
        }
    }
}

async fn fetch_body(page: &Page, request_id: RequestId) -> Result<Vec<u8>, RenderError> {
    let response = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .map_err(cdp_error)?;
    let body = response.result;

    if body.base64_encoded {
        STANDARD
            .decode(body.body.as_bytes())
            .map_err(|e| RenderError::Browser(e.to_string()))
    } else {
        Ok(body.body.into_bytes())
    }
}

/// Fails the render when the page's own document was not a 2xx response
///
/// Pages with no observed document response pass.
fn ensure_document_ok(url: &Url, status: Option<u16>) -> Result<(), RenderError> {
    match status {
        Some(status) if !(200..300).contains(&status) => Err(RenderError::HttpStatus {
            url: url.to_string(),
            status,
        }),
        _ => Ok(()),
    }
}

fn cdp_error(error: CdpError) -> RenderError {
    RenderError::Browser(error.to_string())
}

/// Network activity of one page, shared with its capture task
///
/// Requests are tracked by request id. Chrome repeats `requestWillBeSent`
/// with the same id for every redirect hop but reports the end of the
/// request only once.
struct NetworkActivity {
    state: Mutex<ActivityState>,
}

struct ActivityState {
    in_flight: HashSet<String>,
    responded: HashMap<String, Url>,
    last_event: Instant,
    document_status: Option<u16>,
}

impl NetworkActivity {
    fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                in_flight: HashSet::new(),
                responded: HashMap::new(),
                last_event: Instant::now(),
                document_status: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_started(&self, request_id: &str) {
        let mut state = self.lock();
        state.in_flight.insert(request_id.to_string());
        state.last_event = Instant::now();
    }

    /// Remembers where the body of `request_id` came from
    ///
    /// The first document response is the status of the page itself; later
    /// documents belong to frames.
    fn response_received(&self, request_id: &str, url: &str, is_document: bool, status: i64) {
        let mut state = self.lock();
        state.last_event = Instant::now();

        if is_document && state.document_status.is_none() {
            state.document_status = Some(u16::try_from(status).unwrap_or(0));
        }
        match Url::parse(url) {
            Ok(url) => {
                state.responded.insert(request_id.to_string(), url);
            }
            Err(e) => tracing::trace!("Ignoring response with bad URL {}: {}", url, e),
        }
    }

    /// Ends a request; returns its response URL if it had one
    fn request_finished(&self, request_id: &str) -> Option<Url> {
        let mut state = self.lock();
        state.in_flight.remove(request_id);
        state.last_event = Instant::now();
        state.responded.remove(request_id)
    }

    fn request_failed(&self, request_id: &str) {
        let mut state = self.lock();
        state.in_flight.remove(request_id);
        state.responded.remove(request_id);
        state.last_event = Instant::now();
    }

    fn document_status(&self) -> Option<u16> {
        self.lock().document_status
    }

    fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn is_idle(&self, window: Duration) -> bool {
        let state = self.lock();
        state.in_flight.len() <= ACTIVE_REQUEST_ALLOWANCE && state.last_event.elapsed() >= window
    }
}
