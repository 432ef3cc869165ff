//! Manual test client: joins the arena, wanders a little, casts a spell,
//! and prints everything the server sends back.

use shared::{
    decode, encode, timestamp_millis, Envelope, Message, MessageFramer, PlayerMoveData,
    SpellCastData, Vec2, DEFAULT_PORT,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

async fn send(stream: &mut TcpStream, message: Message) -> Result<(), Box<dyn std::error::Error>> {
    let line = encode(&Envelope::new(message))?;
    stream.write_all(&line).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_PORT));

    let mut stream = TcpStream::connect(&addr).await?;
    println!("Connected to {}", addr);

    send(&mut stream, Message::JoinArena).await?;
    println!("Sent JoinArena, listening for {} seconds...", 10);

    let mut framer = MessageFramer::new();
    let mut buf = [0u8; 4096];
    let mut my_id: Option<String> = None;
    let mut moves_sent = 0u32;
    let deadline = timestamp_millis() + 10_000;

    while timestamp_millis() < deadline {
        tokio::select! {
            result = stream.read(&mut buf) => {
                let n = result?;
                if n == 0 {
                    println!("Server closed the connection");
                    return Ok(());
                }
                framer.extend(&buf[..n]);
                while let Some(frame) = framer.next_frame() {
                    if frame.is_empty() {
                        continue;
                    }
                    match decode(&frame) {
                        Ok(envelope) => {
                            println!("<- {}: {:?}", envelope.message.kind(), envelope.message);
                            if let Message::ArenaState(state) = &envelope.message {
                                // The newest player in the snapshot is us
                                if let Some(me) = state
                                    .players
                                    .iter()
                                    .max_by_key(|p| p.last_update)
                                {
                                    my_id = Some(me.player_id.clone());
                                    println!("Joined as {}", me.player_id);
                                }
                            }
                        }
                        Err(e) => println!("Failed to decode server message: {}", e),
                    }
                }
            }
            _ = sleep(Duration::from_secs(1)) => {
                let Some(id) = my_id.clone() else { continue };
                moves_sent += 1;
                let x = 100.0 + (moves_sent as f32 * 40.0) % 600.0;
                send(&mut stream, Message::PlayerMove(PlayerMoveData {
                    player_id: id.clone(),
                    position: Vec2::new(x, 300.0),
                    velocity: Vec2::new(40.0, 0.0),
                })).await?;
                println!("-> PlayerMove to ({:.0}, 300)", x);

                if moves_sent == 3 {
                    send(&mut stream, Message::CastSpell(SpellCastData {
                        player_id: id,
                        spell_type: "ice_lance".to_string(),
                        position: Vec2::new(400.0, 300.0),
                        direction: Vec2::new(1.0, 0.0),
                        speed: 500.0,
                        damage: 25.0,
                        radius: 30.0,
                    })).await?;
                    println!("-> CastSpell ice_lance at (400, 300)");
                }
            }
        }
    }

    println!("Test client finished");
    Ok(())
}
