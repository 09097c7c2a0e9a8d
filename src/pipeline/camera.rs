use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::Sender;

use crate::types::Frame;

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: u32,
    pub label: String,
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One read from a frame source.
#[cfg_attr(not(feature = "camera-nokhwa"), allow(dead_code))]
pub(crate) enum Capture {
    Frame(Frame),
    Skip,
    End,
}

/// Runs `body` on a capture thread that `CameraStream` stops and joins.
#[cfg_attr(not(feature = "camera-nokhwa"), allow(dead_code))]
pub(crate) fn spawn_capture<F>(frame_tx: Sender<Frame>, body: F) -> CameraStream
where
    F: FnOnce(&AtomicBool, &Sender<Frame>) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let handle = thread::spawn(move || body(&stop_flag, &frame_tx));
    CameraStream {
        stop,
        handle: Some(handle),
    }
}

/// Pulls frames until stopped or the source ends. A frame is dropped when
/// the estimator has not taken the previous one yet.
#[cfg_attr(not(feature = "camera-nokhwa"), allow(dead_code))]
pub(crate) fn run_capture_loop<F>(stop: &AtomicBool, frame_tx: &Sender<Frame>, mut next_frame: F)
where
    F: FnMut() -> Capture,
{
    while !stop.load(Ordering::Relaxed) {
        match next_frame() {
            Capture::Frame(frame) => {
                let _ = frame_tx.try_send(frame);
            }
            Capture::Skip => {}
            Capture::End => break,
        }
    }
}

#[cfg(feature = "camera-nokhwa")]
pub use native::{available_cameras, start_camera_stream};

#[cfg(not(feature = "camera-nokhwa"))]
pub use disabled::{available_cameras, start_camera_stream};

#[cfg(feature = "camera-nokhwa")]
mod native {
    use std::time::Instant;

    use anyhow::{Context, Result, anyhow};
    use crossbeam_channel::Sender;
    use nokhwa::{
        Buffer, Camera,
        pixel_format::RgbFormat,
        query,
        utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    };

    use super::{CameraDevice, CameraStream, Capture, run_capture_loop, spawn_capture};
    use crate::{
        pipeline::rgba_converter::{self, PixelLayout, RgbaFrame},
        types::Frame,
    };

    const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
        FrameFormat::RAWRGB,
        FrameFormat::RAWBGR,
        FrameFormat::GRAY,
        FrameFormat::YUYV,
        FrameFormat::NV12,
        FrameFormat::MJPEG,
    ];

    fn requested_formats() -> [RequestedFormat<'static>; 3] {
        [
            RequestedFormat::with_formats(
                RequestedFormatType::AbsoluteHighestFrameRate,
                PREFERRED_PIXEL_FORMATS,
            ),
            RequestedFormat::with_formats(
                RequestedFormatType::AbsoluteHighestResolution,
                PREFERRED_PIXEL_FORMATS,
            ),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        ]
    }

    pub fn available_cameras() -> Result<Vec<CameraDevice>> {
        let cameras = query(ApiBackend::Auto).context("failed to enumerate cameras")?;
        Ok(cameras
            .into_iter()
            .filter_map(|info| match info.index() {
                CameraIndex::Index(index) => Some(CameraDevice {
                    index: *index,
                    label: info.human_name(),
                }),
                CameraIndex::String(_) => None,
            })
            .collect())
    }

    fn open_camera(index: u32) -> Result<Camera> {
        let mut last_err = None;
        for requested in requested_formats() {
            match Camera::new(CameraIndex::Index(index), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => return Ok(camera),
                    Err(err) => last_err = Some(anyhow::Error::from(err)),
                },
                Err(err) => last_err = Some(err.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("camera {index} supports no usable format")))
    }

    fn layout_of(format: FrameFormat) -> PixelLayout {
        match format {
            FrameFormat::NV12 => PixelLayout::Nv12,
            FrameFormat::YUYV => PixelLayout::Yuyv,
            FrameFormat::MJPEG => PixelLayout::Mjpeg,
            FrameFormat::RAWRGB => PixelLayout::Rgb,
            FrameFormat::RAWBGR => PixelLayout::Bgr,
            FrameFormat::GRAY => PixelLayout::Gray,
        }
    }

    fn convert(buffer: &Buffer) -> Result<RgbaFrame> {
        let resolution = buffer.resolution();
        rgba_converter::to_rgba(
            layout_of(buffer.source_frame_format()),
            buffer.buffer(),
            resolution.width_x,
            resolution.height_y,
        )
    }

    pub fn start_camera_stream(index: u32, frame_tx: Sender<Frame>) -> Result<CameraStream> {
        // Open on the caller's thread so a missing device is reported directly.
        open_camera(index).with_context(|| format!("failed to open camera {index}"))?;

        Ok(spawn_capture(frame_tx, move |stop, frame_tx| {
            let mut camera = match open_camera(index) {
                Ok(camera) => camera,
                Err(err) => {
                    log::error!("failed to open camera {index}: {err:?}");
                    return;
                }
            };
            log::info!("camera {index} opened: {:?}", camera.camera_format());

            run_capture_loop(stop, frame_tx, || read_frame(&mut camera));

            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera {index}: {err:?}");
            }
        }))
    }

    fn read_frame(camera: &mut Camera) -> Capture {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!("camera frame read failed: {err:?}");
                return Capture::Skip;
            }
        };

        match convert(&buffer) {
            Ok(converted) => Capture::Frame(Frame {
                rgba: converted.rgba,
                width: converted.width,
                height: converted.height,
                timestamp: Instant::now(),
            }),
            Err(err) => {
                log::warn!("failed to decode camera frame: {err:?}");
                Capture::Skip
            }
        }
    }
}

#[cfg(not(feature = "camera-nokhwa"))]
mod disabled {
    use anyhow::{Result, bail};
    use crossbeam_channel::Sender;

    use super::{CameraDevice, CameraStream};
    use crate::types::Frame;

    pub fn available_cameras() -> Result<Vec<CameraDevice>> {
        Ok(Vec::new())
    }

    pub fn start_camera_stream(index: u32, _frame_tx: Sender<Frame>) -> Result<CameraStream> {
        bail!("camera {index} unavailable: built without the camera-nokhwa feature")
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crossbeam_channel::bounded;

    use super::*;

    fn spawn_stream<F>(frame_tx: Sender<Frame>, next_frame: F) -> CameraStream
    where
        F: FnMut() -> Capture + Send + 'static,
    {
        spawn_capture(frame_tx, move |stop, frame_tx| {
            run_capture_loop(stop, frame_tx, next_frame)
        })
    }

    fn tiny_frame() -> Frame {
        Frame {
            rgba: vec![0; 4],
            width: 1,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn full_channel_drops_frames_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let mut produced = 0;
        let stream = spawn_stream(tx, move || {
            produced += 1;
            match produced {
                1..=50 if produced % 7 == 0 => Capture::Skip,
                1..=50 => Capture::Frame(tiny_frame()),
                _ => Capture::End,
            }
        });

        std::thread::sleep(Duration::from_millis(20));
        stream.stop();
        assert!(rx.len() <= 1);
    }

    #[test]
    fn drop_joins_the_capture_thread() {
        let (tx, rx) = bounded(1);
        let stream = spawn_stream(tx, || {
            std::thread::sleep(Duration::from_millis(1));
            Capture::Frame(tiny_frame())
        });
        drop(stream);

        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
    }
}
