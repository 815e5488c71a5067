//! WASAPI playback on the default render endpoint.
//!
//! The render thread pulls frames from the decoder handle into the endpoint
//! buffer. The audio engine converts the decoder's format to the mix format
//! (`AUTOCONVERTPCM`), so decoded PCM or float frames play without resampling here.

use std::thread;
use std::time::Duration;

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use voice_recorder_core::{DecoderHandle, OutputProvider, OutputStream, SessionError, StreamStoppedCallback};

use crate::com::{self, MmcssScope};
use crate::error::{Context, WasapiError};
use crate::format;
use crate::worker::{Command, Control, Exit, Worker};

/// Buffer duration requested from the audio engine: 200ms in 100ns units.
const BUFFER_DURATION: i64 = 2_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Opens [`WasapiOutputStream`]s on the default render endpoint.
#[derive(Debug, Default)]
pub struct WasapiOutputProvider;

impl WasapiOutputProvider {
    pub fn new() -> Self {
        Self
    }
}

impl OutputProvider for WasapiOutputProvider {
    fn open_output(
        &self,
        source: DecoderHandle,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn OutputStream>, SessionError> {
        let source_format = source
            .with(|d| d.format())
            .ok_or_else(|| SessionError::Io("decoder is closed".into()))?;

        let (worker, _) = Worker::spawn(
            "wasapi-render",
            on_stopped,
            move || {
                let client = open_render_client(&format::wave_format(&source_format))?;
                Ok((client, source_format))
            },
            move |client, control| render_loop(client, control, source),
        )?;

        log::info!(
            "render opened ({} Hz, {} ch, {} bit)",
            source_format.sample_rate,
            source_format.channels,
            source_format.bits_per_sample
        );
        Ok(Box::new(WasapiOutputStream { worker }))
    }
}

/// The default render endpoint bound to its own thread.
pub struct WasapiOutputStream {
    worker: Worker,
}

impl OutputStream for WasapiOutputStream {
    fn play(&mut self) -> Result<(), SessionError> {
        self.worker.start()
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        self.worker.pause()
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.worker.stop()
    }
}

struct RenderClient {
    audio_client: IAudioClient,
    render_client: IAudioRenderClient,
    buffer_frames: u32,
    block_align: usize,
}

fn open_render_client(wave_format: &WAVEFORMATEX) -> Result<RenderClient, WasapiError> {
    unsafe {
        let enumerator = com::device_enumerator()?;
        let device = com::open_endpoint(&enumerator, None, eRender)?;

        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).context("IMMDevice::Activate")?;
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST
                    | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                    | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
                BUFFER_DURATION,
                0,
                wave_format,
                None,
            )
            .context("IAudioClient::Initialize")?;

        let buffer_frames = audio_client.GetBufferSize().context("IAudioClient::GetBufferSize")?;
        let render_client: IAudioRenderClient = audio_client.GetService().context("IAudioClient::GetService")?;

        Ok(RenderClient {
            audio_client,
            render_client,
            buffer_frames,
            block_align: wave_format.nBlockAlign as usize,
        })
    }
}

/// Serve commands and keep the endpoint buffer full until the decoder runs
/// dry, then let the device play out what is queued.
fn render_loop(client: RenderClient, control: &Control, source: DecoderHandle) -> Result<Exit, SessionError> {
    let _mmcss = MmcssScope::enter();
    let mut running = false;
    let mut draining = false;

    let exit = loop {
        match control.next(running) {
            Some(Command::Start(reply)) => {
                let result = if running {
                    Ok(())
                } else {
                    start(&client, &source, &mut draining)
                };
                running = result.is_ok();
                let _ = reply.send(result);
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

        if !running {
            continue;
        }
        thread::sleep(POLL_INTERVAL);

        if draining {
            match unsafe { client.audio_client.GetCurrentPadding() }.context("IAudioClient::GetCurrentPadding") {
                Ok(0) => break Ok(Exit::EndOfStream),
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            }
        } else {
            match fill(&client, &source) {
                Ok(more) => draining = !more,
                Err(e) => break Err(e),
            }
        }
    };

    unsafe {
        let _ = client.audio_client.Stop();
    }
    exit
}

/// Prime the buffer so playback does not begin on silence, then start.
fn start(client: &RenderClient, source: &DecoderHandle, draining: &mut bool) -> Result<(), SessionError> {
    if !*draining {
        *draining = !fill(client, source)?;
    }
    unsafe { client.audio_client.Start() }.context("IAudioClient::Start")?;
    Ok(())
}

/// Copy decoded frames into the free part of the endpoint buffer.
/// Returns `false` once the decoder has no more data.
fn fill(client: &RenderClient, source: &DecoderHandle) -> Result<bool, SessionError> {
    unsafe {
        let padding = client
            .audio_client
            .GetCurrentPadding()
            .context("IAudioClient::GetCurrentPadding")?;
        let available = client.buffer_frames.saturating_sub(padding);
        if available == 0 {
            return Ok(true);
        }

        let data = client
            .render_client
            .GetBuffer(available)
            .context("IAudioRenderClient::GetBuffer")?;
        let capacity = available as usize * client.block_align;
        let buffer = std::slice::from_raw_parts_mut(data, capacity);

        let mut filled = 0;
        let mut more = true;
        while filled < capacity {
            match source.with(|d| d.read(&mut buffer[filled..])) {
                Some(Ok(0)) | None => {
                    more = false;
                    break;
                }
                Some(Ok(n)) => filled += n,
                Some(Err(e)) => {
                    let _ = client.render_client.ReleaseBuffer(0, 0);
                    return Err(e);
                }
            }
        }

        let frames = (filled / client.block_align) as u32;
        client
            .render_client
            .ReleaseBuffer(frames, 0)
            .context("IAudioRenderClient::ReleaseBuffer")?;
        Ok(more)
    }
}
