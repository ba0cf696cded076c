//! Coin Ticker - a live price widget

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use coin_ticker::config::Config;
use coin_ticker::font::{FontAsset, FontError};
use coin_ticker::ticker::{
    format_price, spawn_feed, FrameHandle, FrameScheduler, MockPriceFeed, PriceHistory,
};
use coin_ticker::ui::backend::BackendError;
use coin_ticker::ui::renderer::{CanvasSize, Compositor, Frame, RendererError};
use coin_ticker::ui::wgpu_backend::WgpuBackend;

/// Events delivered to the event loop from background tasks
enum TickerEvent {
    AtlasLoaded(Result<FontAsset, FontError>),
    Sample(f64),
}

struct TickerApp {
    config: Config,
    runtime: Handle,
    proxy: EventLoopProxy<TickerEvent>,
    window: Option<Arc<Window>>,
    compositor: Option<Compositor<WgpuBackend>>,
    history: PriceHistory,
    scheduler: FrameScheduler,
    /// Most recently requested frame
    frame: Option<FrameHandle>,
    feed: Option<JoinHandle<()>>,
}

impl TickerApp {
    fn new(config: Config, runtime: Handle, proxy: EventLoopProxy<TickerEvent>) -> Self {
        let mut history = PriceHistory::new(config.ticker.history_len);
        history.push(config.ticker.start_price);
        Self {
            config,
            runtime,
            proxy,
            window: None,
            compositor: None,
            history,
            scheduler: FrameScheduler::new(),
            frame: None,
            feed: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(format!("Coin Ticker - {}", self.config.ticker.pair()))
            .with_inner_size(LogicalSize::new(
                self.config.canvas.width,
                self.config.canvas.height,
            ))
            .with_transparent(true);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );

        let backend = pollster::block_on(WgpuBackend::new(window.clone()))
            .context("Failed to initialize GPU")?;
        let compositor =
            Compositor::new(backend, self.config.style()).context("Failed to build shaders")?;

        self.load_atlas();
        self.start_feed();

        self.window = Some(window);
        self.compositor = Some(compositor);
        Ok(())
    }

    /// Load or bake the glyph atlas off the event loop thread.
    fn load_atlas(&self) {
        let proxy = self.proxy.clone();
        let font = self.config.font.clone();
        self.runtime.spawn_blocking(move || {
            let result = match font.font_path() {
                Some(path) => {
                    info!("Loading font from {:?}", path);
                    FontAsset::load(&path, &font.bake_settings())
                }
                None => Err(FontError::NotConfigured),
            };
            let _ = proxy.send_event(TickerEvent::AtlasLoaded(result));
        });
    }

    fn start_feed(&mut self) {
        let proxy = self.proxy.clone();
        let feed = MockPriceFeed::new(self.config.ticker.start_price, self.config.ticker.volatility);
        let _guard = self.runtime.enter();
        self.feed = Some(spawn_feed(feed, self.config.ticker.interval(), move |price| {
            proxy.send_event(TickerEvent::Sample(price)).is_ok()
        }));
    }

    fn request_frame(&mut self) {
        self.frame = Some(self.scheduler.request());
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn render(&mut self) {
        let (Some(window), Some(compositor)) = (&self.window, &mut self.compositor) else {
            return;
        };
        // Nothing is shown until the atlas has either loaded or failed
        if !compositor.text_ready() && compositor.atlas_error().is_none() {
            return;
        }

        let scale = window.scale_factor() as f32;
        let physical = window.inner_size();
        let canvas = CanvasSize {
            width: physical.width as f32 / scale,
            height: physical.height as f32 / scale,
            pixel_ratio: scale,
        };

        let top_text = self.history.latest().map(format_price).unwrap_or_default();
        let bottom_text = self.config.ticker.pair();
        let series = self.history.series();
        let frame = Frame {
            top_text: &top_text,
            bottom_text: &bottom_text,
            series: &series,
            trend: self.history.trend(),
        };

        match compositor.render(&frame, canvas) {
            Ok(stats) => debug!("Rendered frame: {:?}", stats.geometry),
            Err(RendererError::Backend(BackendError::Surface(e))) => {
                warn!("Dropped frame: {}", e)
            }
            Err(e) => error!("Render failed: {}", e),
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(frame) = self.frame.take() {
            self.scheduler.cancel(frame);
        }
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.teardown();
        }
        info!("Shutting down");
        event_loop.exit();
    }
}

impl ApplicationHandler<TickerEvent> for TickerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            error!("{:#}", e);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: TickerEvent) {
        match event {
            TickerEvent::AtlasLoaded(result) => {
                if let Some(compositor) = self.compositor.as_mut() {
                    if let Err(e) = compositor.atlas_loaded(result) {
                        error!("Failed to upload glyph atlas: {}", e);
                    }
                }
            }
            TickerEvent::Sample(price) => self.history.push(price),
        }
        self.request_frame();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.request_frame(),
            WindowEvent::RedrawRequested => {
                let fired = self
                    .frame
                    .take()
                    .is_some_and(|frame| self.scheduler.fire(frame));
                if fired {
                    self.render();
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Coin Ticker v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Using default config: {:#}", e);
        Config::default()
    });

    let event_loop = EventLoop::<TickerEvent>::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    let mut app = TickerApp::new(config, Handle::current(), event_loop.create_proxy());
    event_loop.run_app(&mut app).context("Event loop failed")?;

    Ok(())
}
