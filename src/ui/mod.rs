use std::{
    path::Path,
    sync::Arc,
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use gpui::{
    App, AppContext, Bounds, Context, Render, RenderImage, TitlebarOptions, Window,
    WindowBounds, WindowOptions, px, size,
};
use gpui_component::Root;

use crate::{
    bvh,
    config::ViewerConfig,
    hierarchy::HierarchyTree,
    landmark::HandLandmark,
    pipeline::{self, CameraStream, EstimatorBackend},
    playback::Playback,
    scene::{BvhScene, Canvas, HandScene, HumanoidScene, Layer, MultiView, SceneView, color_from_f32},
    types::{Frame, HandFrame},
};

mod download;
mod main_view;
mod render_util;

use download::{DownloadMessage, DownloadState};

pub const WINDOW_TITLE: &str = "bvh view";

const VIEWPORT_BASE_SIZE: (f32, f32) = (640.0, 480.0);
const CLEAR_COLOR: (f32, f32, f32, f32) = (0.2, 0.2, 0.2, 1.0);
const BVH_COLOR: (f32, f32, f32, f32) = (0.9, 0.75, 0.45, 1.0);
const HAND_COLOR: (f32, f32, f32, f32) = (0.35, 0.85, 0.45, 1.0);
const HUMANOID_COLOR: (f32, f32, f32, f32) = (0.4, 0.4, 0.4, 1.0);
const RIGHT_PANEL_INITIAL_WIDTH: f32 = 360.0;

pub fn launch_ui(app: &mut App, config: ViewerConfig) -> gpui::Result<()> {
    let (width, height) = config.scaled_window_size();
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(WINDOW_TITLE.into()),
            ..Default::default()
        }),
        window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
            None,
            size(px(width), px(height)),
            app,
        ))),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| {
            let startup = config.bvh.clone();
            let mut view = AppView::new(config);
            if let Some(path) = startup {
                view.open(&path);
            }
            view
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct OrbitDrag {
    last: (f32, f32),
}

struct PanelResizeState {
    start_pointer_x: f32,
    start_width: f32,
}

/// Camera capture and estimator state, present only with `--hands`.
struct HandsState {
    landmark: HandLandmark,
    capture_image: Option<Arc<RenderImage>>,
    download: DownloadState,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
    frame_tx: Sender<Frame>,
    frame_rx: Option<Receiver<Frame>>,
    result_tx: Option<Sender<HandFrame>>,
    result_rx: Receiver<HandFrame>,
    camera_stream: Option<CameraStream>,
    estimator_handle: Option<thread::JoinHandle<()>>,
    camera_error: Option<String>,
}

impl HandsState {
    fn new(config: &ViewerConfig) -> Self {
        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(config.model_dir.clone(), download_tx);
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);

        Self {
            landmark: HandLandmark::new(),
            capture_image: None,
            download: DownloadState::new(),
            download_rx,
            _download_handle: download_handle,
            frame_tx,
            frame_rx: Some(frame_rx),
            result_tx: Some(result_tx),
            result_rx,
            camera_stream: None,
            estimator_handle: None,
            camera_error: None,
        }
    }

    fn capture_started(&self) -> bool {
        self.estimator_handle.is_some() || self.camera_error.is_some()
    }

    /// Opens the camera, then feeds it to the estimator.
    fn start_capture(&mut self, config: &ViewerConfig) {
        match pipeline::available_cameras() {
            Ok(cameras) => {
                for camera in &cameras {
                    log::info!("camera {}: {}", camera.index, camera.label);
                }
            }
            Err(err) => log::warn!("failed to list cameras: {err:?}"),
        }

        let stream = match pipeline::start_camera_stream(config.camera_index, self.frame_tx.clone())
        {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("failed to start camera: {err:?}");
                self.camera_error = Some(format!("{err:#}"));
                return;
            }
        };
        self.camera_stream = Some(stream);

        let (Some(frame_rx), Some(result_tx)) = (self.frame_rx.take(), self.result_tx.take())
        else {
            log::warn!("hand landmark estimator already started");
            return;
        };
        let backend = EstimatorBackend::new(&config.model_dir, config.estimator.clone());
        self.estimator_handle = Some(pipeline::start_estimator(backend, frame_rx, result_tx));
    }
}

impl Drop for HandsState {
    fn drop(&mut self) {
        if let Some(stream) = self.camera_stream.take() {
            stream.stop();
        }
    }
}

pub(crate) struct AppView {
    config: ViewerConfig,
    title: String,
    title_dirty: bool,
    hierarchy: Option<HierarchyTree>,
    hierarchy_error: Option<String>,
    playback: Option<Playback>,
    multiview: MultiView,
    humanoid_view: SceneView<HumanoidScene>,
    show_humanoid: bool,
    bvh_view: Option<SceneView<BvhScene>>,
    hand_view: SceneView<HandScene>,
    viewport_image: Option<Arc<RenderImage>>,
    viewport_dirty: bool,
    orbit_drag: Option<OrbitDrag>,
    right_panel_width: f32,
    panel_resize: Option<PanelResizeState>,
    hands: Option<HandsState>,
}

impl AppView {
    fn new(config: ViewerConfig) -> Self {
        let raster = (
            (VIEWPORT_BASE_SIZE.0 * config.gui_scale).round() as u32,
            (VIEWPORT_BASE_SIZE.1 * config.gui_scale).round() as u32,
        );
        let mut hand_view = SceneView::new(HandScene::new(), color_from_f32(HAND_COLOR));
        hand_view.camera.distance = 0.4;
        hand_view.camera.z_near = 0.01;
        hand_view.camera.z_far = 10.0;
        let mut humanoid_view =
            SceneView::new(HumanoidScene::new(), color_from_f32(HUMANOID_COLOR));
        humanoid_view.camera.distance = 4.0;
        humanoid_view.camera.target.y = 0.9;
        let hands = config.hands.then(|| HandsState::new(&config));

        Self {
            config,
            title: WINDOW_TITLE.to_string(),
            title_dirty: true,
            hierarchy: None,
            hierarchy_error: None,
            playback: None,
            multiview: MultiView::new(raster.0.max(1), raster.1.max(1), color_from_f32(CLEAR_COLOR)),
            humanoid_view,
            show_humanoid: true,
            bvh_view: None,
            hand_view,
            viewport_image: None,
            viewport_dirty: true,
            orbit_drag: None,
            right_panel_width: RIGHT_PANEL_INITIAL_WIDTH,
            panel_resize: None,
            hands,
        }
    }

    /// Loads `path` into the tree, the timeline and the 3D view.
    pub(crate) fn open(&mut self, path: &Path) {
        if !path.exists() {
            log::warn!("{} does not exist", path.display());
            return;
        }

        let bvh = match bvh::load(path) {
            Ok(bvh) => bvh,
            Err(err) => {
                log::error!("failed to open {}: {err}", path.display());
                self.hierarchy.get_or_insert_with(HierarchyTree::default).clear();
                self.hierarchy_error = Some(format!("{}: {err}", path.display()));
                return;
            }
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!(
            "loaded {file_name}: {} joints, {} frames, {} seconds",
            bvh.joints().len(),
            bvh.frames,
            bvh.get_seconds()
        );

        self.hierarchy = Some(HierarchyTree::build(&bvh));
        self.hierarchy_error = None;

        let view = self.bvh_view.get_or_insert_with(|| {
            let mut view = SceneView::new(BvhScene::new(), color_from_f32(BVH_COLOR));
            view.camera.distance *= 100.0;
            view.camera.z_far *= 100.0;
            view
        });
        view.scene.load(&bvh);

        self.playback
            .get_or_insert_with(Playback::new)
            .set_bvh(&bvh, self.config.easing, self.config.looping);

        self.title = window_title(&file_name, bvh.get_seconds());
        self.title_dirty = true;
        self.viewport_dirty = true;
    }

    pub(crate) fn set_frame(&mut self, frame: usize) {
        if let Some(view) = self.bvh_view.as_mut() {
            view.scene.set_frame(frame);
            self.viewport_dirty = true;
        }
    }

    fn layers_mut(&mut self) -> Vec<&mut dyn Layer> {
        let mut layers: Vec<&mut dyn Layer> = vec![&mut self.humanoid_view];
        if let Some(view) = self.bvh_view.as_mut() {
            layers.push(view);
        }
        if self.hands.is_some() {
            layers.push(&mut self.hand_view);
        }
        layers
    }

    fn toggle_humanoid(&mut self) {
        self.show_humanoid = !self.show_humanoid;
        self.viewport_dirty = true;
    }

    /// Back to front: humanoid reference, motion, tracked hand.
    fn render_layers(&self) -> Canvas {
        let mut layers: Vec<&dyn Layer> = Vec::new();
        if self.show_humanoid {
            layers.push(&self.humanoid_view);
        }
        if let Some(view) = self.bvh_view.as_ref() {
            layers.push(view);
        }
        if self.hands.is_some() {
            layers.push(&self.hand_view);
        }
        self.multiview.render(&layers)
    }

    fn tick_playback(&mut self) {
        let frame = self
            .playback
            .as_mut()
            .and_then(|playback| playback.tick(Instant::now()));
        if let Some(frame) = frame {
            self.set_frame(frame);
        }
    }

    fn poll_hands(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(hands) = self.hands.as_mut() else {
            return;
        };

        hands.download.poll(&hands.download_rx);
        if hands.download.is_ready() && !hands.capture_started() {
            hands.start_capture(&self.config);
        }

        let mut updated = false;
        while let Ok(result) = hands.result_rx.try_recv() {
            hands.landmark.apply(&result);
            updated = true;
        }
        if !updated {
            return;
        }

        self.hand_view.scene = hands.landmark.hand.clone();
        self.viewport_dirty = true;
        if let Some(image) = hands
            .landmark
            .capture
            .render()
            .and_then(|canvas| render_util::canvas_to_image(&canvas))
        {
            if let Some(old) = hands.capture_image.replace(image) {
                cx.drop_image(old, Some(window));
            }
        }
    }

    fn refresh_viewport(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if !self.viewport_dirty {
            return;
        }
        self.viewport_dirty = false;

        let canvas = self.render_layers();

        if let Some(image) = render_util::canvas_to_image(&canvas) {
            if let Some(old) = self.viewport_image.replace(image) {
                cx.drop_image(old, Some(window));
            }
        }
    }
}

fn window_title(file_name: &str, seconds: f64) -> String {
    format!("{file_name} {seconds:?}seconds")
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        if self.title_dirty {
            window.set_window_title(&self.title);
            self.title_dirty = false;
        }

        self.tick_playback();
        self.poll_hands(window, cx);
        self.refresh_viewport(window, cx);
        self.render_main(window, cx)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::config::Args;

    fn view() -> AppView {
        let args = Args::try_parse_from(["humanbone-viewer", "--gui-scale", "0.1"]).unwrap();
        AppView::new(ViewerConfig::from_args(args).unwrap())
    }

    #[test]
    fn humanoid_reference_is_drawn_until_hidden() {
        let mut view = view();
        let clear = color_from_f32(CLEAR_COLOR);
        let humanoid = color_from_f32(HUMANOID_COLOR);

        let canvas = view.render_layers();
        assert!(canvas.rgba.chunks_exact(4).any(|px| px == humanoid));

        view.toggle_humanoid();
        assert!(view.viewport_dirty);
        let canvas = view.render_layers();
        assert!(canvas.rgba.chunks_exact(4).all(|px| px == clear));
    }

    #[test]
    fn humanoid_layer_orbits_with_the_others() {
        let mut view = view();
        let before = view.humanoid_view.camera.yaw;
        for layer in view.layers_mut() {
            layer.camera_mut().orbit(10.0, 0.0);
        }
        assert_ne!(view.humanoid_view.camera.yaw, before);
    }

    #[test]
    fn title_keeps_the_fraction_of_whole_seconds() {
        assert_eq!(window_title("walk.bvh", 1.0), "walk.bvh 1.0seconds");
        assert_eq!(window_title("run.bvh", 2.5), "run.bvh 2.5seconds");
    }
}
