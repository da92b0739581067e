//! Keyboard source (I): raw bytes in, one key message per byte out.

use skyboard_core::KeyMsg;
use skyboard_env::{FrameSender, SignalReceiver, UnitRole};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// Forwards every byte read from `input` as a [`KeyMsg`].
///
/// Stops on end of input, on a read error, after forwarding `q`, when the
/// coordinator stops listening, or on the stop signal. Returns the number of
/// keys forwarded.
pub async fn run_keyboard<R>(mut input: R, keys: FrameSender<KeyMsg>, mut stop: SignalReceiver) -> usize
where
    R: AsyncRead + Unpin,
{
    let role = UnitRole::Keyboard;
    let mut buf = [0u8; 64];
    let mut forwarded = 0;
    info!(%role, "keyboard started");

    'outer: loop {
        let n = tokio::select! {
            biased;
            _ = stop.raised() => {
                info!(%role, "stop requested");
                break;
            }
            read = input.read(&mut buf) => match read {
                Ok(0) => {
                    info!(%role, "end of input");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(%role, error = %e, "read failed");
                    break;
                }
            },
        };

        for &key in &buf[..n] {
            if keys.send(&KeyMsg { key }).await.is_err() {
                debug!(%role, "coordinator gone");
                break 'outer;
            }
            forwarded += 1;
            if key == b'q' {
                info!(%role, "quit forwarded");
                break 'outer;
            }
        }
    }

    forwarded
}
