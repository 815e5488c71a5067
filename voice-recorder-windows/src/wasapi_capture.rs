//! WASAPI microphone capture.
//!
//! Captures from a capture endpoint in shared mode at the device mix format
//! and hands each packet to the recorder as raw interleaved bytes.

use std::thread;
use std::time::Duration;

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use voice_recorder_core::{
    AudioDevice, CaptureDataCallback, CaptureProvider, CaptureStream, SessionError, StreamFormat,
    StreamStoppedCallback,
};

use crate::com::{self, MmcssScope};
use crate::error::{Context, WasapiError};
use crate::format;
use crate::permissions;
use crate::worker::{Command, Control, Exit, Worker};

/// Buffer duration requested from the audio engine: 100ms in 100ns units.
const BUFFER_DURATION: i64 = 1_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Opens [`WasapiCaptureStream`]s on capture endpoints.
#[derive(Debug, Default)]
pub struct WasapiCaptureProvider {
    skip_permission_check: bool,
}

impl WasapiCaptureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the privacy-setting probe, for hosts that have already checked it.
    pub fn without_permission_check() -> Self {
        Self {
            skip_permission_check: true,
        }
    }
}

impl CaptureProvider for WasapiCaptureProvider {
    fn open_capture(
        &self,
        device: &AudioDevice,
        on_data: CaptureDataCallback,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn CaptureStream>, SessionError> {
        if !self.skip_permission_check && !permissions::check_microphone_permission()? {
            return Err(WasapiError::AccessDenied.into());
        }

        let device_id = device.id.clone();
        let (worker, format) = Worker::spawn(
            "wasapi-capture",
            on_stopped,
            move || open_capture_client(&device_id),
            move |client, control| capture_loop(client, control, on_data),
        )?;

        log::info!(
            "capture opened on {} ({} Hz, {} ch, {} bit)",
            device.name,
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        );
        Ok(Box::new(WasapiCaptureStream { worker, format }))
    }
}

/// A capture endpoint bound to its own thread.
pub struct WasapiCaptureStream {
    worker: Worker,
    format: StreamFormat,
}

impl CaptureStream for WasapiCaptureStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self) -> Result<(), SessionError> {
        self.worker.start()
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        self.worker.pause()
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.worker.stop()
    }
}

/// COM objects owned by the capture thread.
struct CaptureClient {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    block_align: usize,
}

/// Activate and initialize the endpoint in shared mode.
///
/// Sequence:
/// 1. Resolve the endpoint by id
/// 2. Activate IAudioClient
/// 3. Initialize with the device mix format
/// 4. Get the IAudioCaptureClient service
fn open_capture_client(device_id: &str) -> Result<(CaptureClient, StreamFormat), SessionError> {
    unsafe {
        let enumerator = com::device_enumerator()?;
        let device = com::open_endpoint(&enumerator, Some(device_id), eCapture)?;

        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).context("IMMDevice::Activate")?;

        let mix_format_ptr = audio_client.GetMixFormat().context("IAudioClient::GetMixFormat")?;
        let opened = (|| {
            let mix_format = &*mix_format_ptr;
            let format = format::stream_format(mix_format)?;

            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_NOPERSIST,
                    BUFFER_DURATION,
                    0,
                    mix_format,
                    None,
                )
                .context("IAudioClient::Initialize")?;
            Ok::<_, WasapiError>(format)
        })();
        CoTaskMemFree(Some(mix_format_ptr as *const _));
        let format = opened?;

        let capture_client: IAudioCaptureClient = audio_client.GetService().context("IAudioClient::GetService")?;

        Ok((
            CaptureClient {
                audio_client,
                capture_client,
                block_align: format.block_align() as usize,
            },
            format,
        ))
    }
}

/// Serve commands and drain packets until stopped.
fn capture_loop(client: CaptureClient, control: &Control, on_data: CaptureDataCallback) -> Result<Exit, SessionError> {
    let _mmcss = MmcssScope::enter();
    let mut running = false;

    let exit = loop {
        match control.next(running) {
            Some(Command::Start(reply)) => {
                let result = if running {
                    Ok(())
                } else {
                    unsafe { client.audio_client.Start() }.context("IAudioClient::Start")
                };
                running = result.is_ok();
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Some(Command::Pause(reply)) => {
                let result = if running {
                    unsafe { client.audio_client.Stop() }.context("IAudioClient::Stop")
                } else {
                    Ok(())
                };
                running = false;
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Some(Command::Stop) => break Ok(Exit::Requested),
            None => {}
        }

        if running {
            thread::sleep(POLL_INTERVAL);
            if let Err(e) = drain_packets(&client, &on_data) {
                break Err(e);
            }
        }
    };

    unsafe {
        let _ = client.audio_client.Stop();
    }
    exit
}

/// Hand every pending packet to `on_data`, in order.
fn drain_packets(client: &CaptureClient, on_data: &CaptureDataCallback) -> Result<(), SessionError> {
    unsafe {
        let mut packet_length = client
            .capture_client
            .GetNextPacketSize()
            .context("IAudioCaptureClient::GetNextPacketSize")?;

        while packet_length > 0 {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            client
                .capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .context("IAudioCaptureClient::GetBuffer")?;

            let delivered = if num_frames > 0 && !buffer_ptr.is_null() {
                let len = num_frames as usize * client.block_align;
                if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    on_data(&vec![0u8; len])
                } else {
                    on_data(std::slice::from_raw_parts(buffer_ptr, len))
                }
            } else {
                Ok(())
            };

            client
                .capture_client
                .ReleaseBuffer(num_frames)
                .context("IAudioCaptureClient::ReleaseBuffer")?;
            delivered?;

            packet_length = client
                .capture_client
                .GetNextPacketSize()
                .context("IAudioCaptureClient::GetNextPacketSize")?;
        }
    }
    Ok(())
}
