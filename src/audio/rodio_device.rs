//! 基于 rodio/cpal 的真实音频设备。
//!
//! `OutputStream` 与 cpal `Stream` 都不是 `Send`，因此全部硬件对象由专用线程持有，
//! 异步调用方通过命令通道与其交互。

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use hound::{SampleFormat as WavSampleFormat, WavSpec, WavWriter};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::device::{AudioDevice, AudioError, ClipId, ClipSource, PlayMode, RecordingArtifact};
use crate::config::CallConfig;

const TARGET: &str = "audio_manager";
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const RINGTONE_SAMPLE_RATE: u32 = 16_000;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Load {
        source: ClipSource,
        mode: PlayMode,
        reply: Reply<Result<ClipId, AudioError>>,
    },
    Play {
        clip: ClipId,
        reply: Reply<Result<(), AudioError>>,
    },
    WaitFinished {
        clip: ClipId,
        reply: Reply<()>,
    },
    IsLoaded {
        clip: ClipId,
        reply: Reply<bool>,
    },
    Stop {
        clip: ClipId,
        reply: Reply<Result<(), AudioError>>,
    },
    Unload {
        clip: ClipId,
        reply: Reply<Result<(), AudioError>>,
    },
    StartRecording {
        reply: Reply<Result<(), AudioError>>,
    },
    StopRecording {
        reply: Reply<Result<RecordingArtifact, AudioError>>,
    },
    DiscardRecording {
        reply: Reply<()>,
    },
    Shutdown,
}

/// 在本机声卡上播放铃声与 AI 语音，并用默认麦克风录制 WAV。
pub struct RodioAudioDevice {
    commands: Mutex<Sender<Command>>,
}

impl RodioAudioDevice {
    pub fn new(config: &CallConfig) -> Result<Self, AudioError> {
        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let ringtone_path = config.ringtone_path.clone();
        let recording_dir = config.recording_dir.clone();

        thread::Builder::new()
            .name("ringapp-audio".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(err) => {
                        let _ = ready_tx.send(Err(AudioError::unavailable(err.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let mut worker = Worker::new(handle, ringtone_path, recording_dir);
                worker.run(inbox);
                drop(stream);
            })
            .map_err(|err| AudioError::unavailable(err.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::unavailable("audio thread exited during startup"))??;

        info!(target: TARGET, "rodio audio device ready");
        Ok(Self {
            commands: Mutex::new(commands),
        })
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, AudioError> {
        let (reply, response) = oneshot::channel();
        {
            let sender = self
                .commands
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sender
                .send(build(reply))
                .map_err(|_| AudioError::unavailable("audio thread has stopped"))?;
        }
        response
            .await
            .map_err(|_| AudioError::unavailable("audio thread dropped the request"))
    }
}

impl Drop for RodioAudioDevice {
    fn drop(&mut self) {
        if let Ok(sender) = self.commands.lock() {
            let _ = sender.send(Command::Shutdown);
        }
    }
}

#[async_trait]
impl AudioDevice for RodioAudioDevice {
    async fn request_record_permission(&self) -> Result<bool, AudioError> {
        Ok(cpal::default_host().default_input_device().is_some())
    }

    async fn load(&self, source: ClipSource, mode: PlayMode) -> Result<ClipId, AudioError> {
        self.request(|reply| Command::Load {
            source,
            mode,
            reply,
        })
        .await?
    }

    async fn play(&self, clip: ClipId) -> Result<(), AudioError> {
        self.request(|reply| Command::Play { clip, reply }).await?
    }

    async fn wait_finished(&self, clip: ClipId) -> Result<(), AudioError> {
        self.request(|reply| Command::WaitFinished { clip, reply })
            .await
    }

    async fn is_loaded(&self, clip: ClipId) -> bool {
        self.request(|reply| Command::IsLoaded { clip, reply })
            .await
            .unwrap_or(false)
    }

    async fn stop(&self, clip: ClipId) -> Result<(), AudioError> {
        self.request(|reply| Command::Stop { clip, reply }).await?
    }

    async fn unload(&self, clip: ClipId) -> Result<(), AudioError> {
        self.request(|reply| Command::Unload { clip, reply }).await?
    }

    async fn start_recording(&self) -> Result<(), AudioError> {
        self.request(|reply| Command::StartRecording { reply })
            .await?
    }

    async fn stop_recording(&self) -> Result<RecordingArtifact, AudioError> {
        self.request(|reply| Command::StopRecording { reply })
            .await?
    }

    async fn discard_recording(&self) -> Result<(), AudioError> {
        self.request(|reply| Command::DiscardRecording { reply })
            .await
    }
}

struct ActiveRecording {
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: usize,
}

struct Worker {
    handle: OutputStreamHandle,
    ringtone_path: Option<PathBuf>,
    recording_dir: PathBuf,
    next_id: u64,
    sinks: HashMap<ClipId, Sink>,
    waiters: Vec<(ClipId, Reply<()>)>,
    recording: Option<ActiveRecording>,
}

impl Worker {
    fn new(
        handle: OutputStreamHandle,
        ringtone_path: Option<PathBuf>,
        recording_dir: PathBuf,
    ) -> Self {
        Self {
            handle,
            ringtone_path,
            recording_dir,
            next_id: 0,
            sinks: HashMap::new(),
            waiters: Vec::new(),
            recording: None,
        }
    }

    fn run(&mut self, inbox: Receiver<Command>) {
        loop {
            match inbox.recv_timeout(POLL_INTERVAL) {
                Ok(Command::Shutdown) => break,
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.resolve_waiters();
        }

        for (_, sink) in self.sinks.drain() {
            sink.stop();
        }
        self.recording = None;
        debug!(target: TARGET, "audio thread stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Load {
                source,
                mode,
                reply,
            } => {
                let _ = reply.send(self.load(source, mode));
            }
            Command::Play { clip, reply } => {
                let result = match self.sinks.get(&clip) {
                    Some(sink) => {
                        sink.play();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded(clip)),
                };
                let _ = reply.send(result);
            }
            Command::WaitFinished { clip, reply } => self.waiters.push((clip, reply)),
            Command::IsLoaded { clip, reply } => {
                let _ = reply.send(self.sinks.contains_key(&clip));
            }
            Command::Stop { clip, reply } => {
                let result = match self.sinks.get(&clip) {
                    Some(sink) => {
                        sink.stop();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded(clip)),
                };
                let _ = reply.send(result);
            }
            Command::Unload { clip, reply } => {
                let result = match self.sinks.remove(&clip) {
                    Some(sink) => {
                        sink.stop();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded(clip)),
                };
                let _ = reply.send(result);
            }
            Command::StartRecording { reply } => {
                let _ = reply.send(self.start_recording());
            }
            Command::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording());
            }
            Command::DiscardRecording { reply } => {
                if self.recording.take().is_some() {
                    debug!(target: TARGET, "recording discarded");
                }
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn load(&mut self, source: ClipSource, mode: PlayMode) -> Result<ClipId, AudioError> {
        let sink =
            Sink::try_new(&self.handle).map_err(|err| AudioError::playback(err.to_string()))?;
        sink.pause();

        match source {
            ClipSource::Ringtone => match &self.ringtone_path {
                Some(path) => {
                    let bytes = fs::read(path).map_err(|err| {
                        AudioError::decode(format!("{}: {err}", path.display()))
                    })?;
                    append_encoded(&sink, bytes, mode)?;
                }
                None => {
                    let tone = synthesized_ringtone();
                    match mode {
                        PlayMode::Looping => sink.append(tone.repeat_infinite()),
                        PlayMode::Once => sink.append(tone),
                    }
                }
            },
            ClipSource::Encoded(bytes) => append_encoded(&sink, bytes.to_vec(), mode)?,
        }

        self.next_id += 1;
        let clip = ClipId::new(self.next_id);
        self.sinks.insert(clip, sink);
        Ok(clip)
    }

    fn resolve_waiters(&mut self) {
        if self.waiters.is_empty() {
            return;
        }
        let sinks = &self.sinks;
        let (finished, pending): (Vec<_>, Vec<_>) =
            self.waiters
                .drain(..)
                .partition(|(clip, _)| match sinks.get(clip) {
                    Some(sink) => sink.empty(),
                    None => true,
                });
        self.waiters = pending;
        for (_, reply) in finished {
            let _ = reply.send(());
        }
    }

    fn start_recording(&mut self) -> Result<(), AudioError> {
        if self.recording.is_some() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_input_device()
            .ok_or(AudioError::PermissionDenied)?;
        let supported = device
            .default_input_config()
            .map_err(|err| AudioError::recording(err.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let err_fn = |err: cpal::StreamError| warn!(target: TARGET, %err, "audio capture error");

        let stream = match sample_format {
            SampleFormat::F32 => {
                let writer = samples.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| push_samples(&writer, data),
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let writer = samples.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted: Vec<f32> = data
                            .iter()
                            .map(|sample| *sample as f32 / i16::MAX as f32)
                            .collect();
                        push_samples(&writer, &converted);
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(AudioError::recording(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|err| AudioError::recording(err.to_string()))?;

        stream
            .play()
            .map_err(|err| AudioError::recording(err.to_string()))?;

        self.recording = Some(ActiveRecording {
            stream,
            samples,
            sample_rate: config.sample_rate.0,
            channels: config.channels.max(1) as usize,
        });
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<RecordingArtifact, AudioError> {
        let recording = self
            .recording
            .take()
            .ok_or_else(|| AudioError::recording("no recording in progress"))?;
        let ActiveRecording {
            stream,
            samples,
            sample_rate,
            channels,
        } = recording;
        drop(stream);

        let captured = samples
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        let mono = downmix(&captured, channels);

        fs::create_dir_all(&self.recording_dir)
            .map_err(|err| AudioError::recording(err.to_string()))?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let path = self.recording_dir.join(format!("recording-{stamp}.wav"));
        write_wav(&path, &mono, sample_rate)?;

        Ok(RecordingArtifact::new(path))
    }
}

fn append_encoded(sink: &Sink, bytes: Vec<u8>, mode: PlayMode) -> Result<(), AudioError> {
    let decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|err| AudioError::decode(err.to_string()))?;
    match mode {
        PlayMode::Looping => sink.append(decoder.repeat_infinite()),
        PlayMode::Once => sink.append(decoder),
    }
    Ok(())
}

/// 双音振铃：2 秒 440Hz+480Hz，随后 4 秒静音。
fn synthesized_ringtone() -> SamplesBuffer<f32> {
    let rate = RINGTONE_SAMPLE_RATE as usize;
    let mut samples = Vec::with_capacity(rate * 6);
    for index in 0..rate * 2 {
        let t = index as f32 / RINGTONE_SAMPLE_RATE as f32;
        let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            + (2.0 * std::f32::consts::PI * 480.0 * t).sin();
        samples.push(value * 0.2);
    }
    samples.resize(rate * 6, 0.0);
    SamplesBuffer::new(1, RINGTONE_SAMPLE_RATE, samples)
}

fn push_samples(target: &Arc<Mutex<Vec<f32>>>, data: &[f32]) {
    if let Ok(mut guard) = target.lock() {
        guard.extend_from_slice(data);
    }
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn write_wav(path: &std::path::Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: WavSampleFormat::Int,
    };
    let mut writer =
        WavWriter::create(path, spec).map_err(|err| AudioError::recording(err.to_string()))?;
    for sample in samples {
        let value = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|err| AudioError::recording(err.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|err| AudioError::recording(err.to_string()))
}
