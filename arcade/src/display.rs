// highgui window for the cabinet screen: a 25 px border in the light's
// colour, the countdown centred while players line up, and a labelled box
// per tracked person (red once eliminated). The end-of-game card lists the
// standings above a row of the patches taken when each player registered.

use crate::convert::{frame_to_bgr, gray_to_bgr};
use opencv::{
    core::{self, CV_8UC3, Mat, Point, Rect, Scalar, Size, Vector},
    highgui, imgproc,
    prelude::*,
};
use red_light_vision::{Display, DisplayEvent, Frame, Light, Overlay, Player, Standings};
use tracing::warn;

const BORDER_THICKNESS: i32 = 25;
const END_KEY: i32 = 'e' as i32;
const STANDINGS_HOLD_MS: i32 = 5000;
const CARD_WIDTH: i32 = 640;
const PORTRAIT_SIZE: (i32, i32) = (96, 192);

fn green() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn white() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

pub struct HighGuiDisplay {
    window: String,
}

impl HighGuiDisplay {
    pub fn open(window: &str) -> opencv::Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            window: window.to_owned(),
        })
    }

    fn draw(&self, frame: &Frame, overlay: &Overlay) -> opencv::Result<i32> {
        let mut canvas = frame_to_bgr(frame)?;

        for marker in &overlay.markers {
            let b = &marker.bbox;
            let rect = Rect::new(b.x as i32, b.y as i32, b.width as i32, b.height as i32);
            let color = if marker.eliminated { red() } else { green() };
            imgproc::rectangle(&mut canvas, rect, color, 2, imgproc::LINE_8, 0)?;
            let label = if marker.is_player {
                format!("Player {}", marker.id)
            } else {
                format!("#{}", marker.id)
            };
            put_label(&mut canvas, &label, Point::new(rect.x, (rect.y - 8).max(12)), 0.6, color)?;
        }

        if let Some(remaining) = overlay.countdown {
            let text = format!("{:.2}", remaining.as_secs_f64());
            let mut baseline = 0;
            let font = imgproc::FONT_HERSHEY_SIMPLEX;
            let size = imgproc::get_text_size(&text, font, 1.0, 2, &mut baseline)?;
            let origin = Point::new(
                (canvas.cols() - size.width) / 2,
                (canvas.rows() + size.height) / 2,
            );
            put_label(&mut canvas, &text, origin, 1.0, white())?;
        }

        if let Some(light) = overlay.border {
            let color = match light {
                Light::Green => green(),
                Light::Red => red(),
            };
            let full = Rect::new(0, 0, canvas.cols(), canvas.rows());
            imgproc::rectangle(&mut canvas, full, color, BORDER_THICKNESS, imgproc::LINE_8, 0)?;
        }

        highgui::imshow(&self.window, &canvas)?;
        highgui::wait_key(1)
    }

    fn draw_standings(&self, standings: &Standings, players: &[Player]) -> opencv::Result<()> {
        let strip = portrait_strip(players)?;
        let width = strip.as_ref().map_or(CARD_WIDTH, |s| s.cols().max(CARD_WIDTH));

        let mut text = Mat::new_rows_cols_with_default(240, width, CV_8UC3, Scalar::all(0.0))?;
        for (i, line) in standings.to_string().lines().enumerate() {
            put_label(&mut text, line, Point::new(20, 80 + 60 * i as i32), 0.9, white())?;
        }

        let card = match strip {
            Some(strip) => {
                let mut padded = Mat::default();
                let right = width - strip.cols();
                let black = Scalar::all(0.0);
                let border = core::BORDER_CONSTANT;
                core::copy_make_border(&strip, &mut padded, 0, 0, 0, right, border, black)?;
                let mut card = Mat::default();
                core::vconcat(&Vector::<Mat>::from_iter([text, padded]), &mut card)?;
                card
            }
            None => text,
        };
        highgui::imshow(&self.window, &card)?;
        highgui::wait_key(STANDINGS_HOLD_MS)?;
        Ok(())
    }
}

/// One labelled thumbnail per player, side by side. `None` without players.
fn portrait_strip(players: &[Player]) -> opencv::Result<Option<Mat>> {
    let mut portraits = Vector::<Mat>::new();
    for player in players {
        let patch = player.reference_patch();
        let (width, height) = PORTRAIT_SIZE;
        let mut portrait = if patch.width() == 0 || patch.height() == 0 {
            Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?
        } else {
            let mut resized = Mat::default();
            let size = Size::new(width, height);
            let patch = gray_to_bgr(patch)?;
            imgproc::resize(&patch, &mut resized, size, 0.0, 0.0, imgproc::INTER_AREA)?;
            resized
        };
        let color = if player.is_eliminated() { red() } else { green() };
        let full = Rect::new(0, 0, width, height);
        imgproc::rectangle(&mut portrait, full, color, 3, imgproc::LINE_8, 0)?;
        put_label(&mut portrait, &player.number().to_string(), Point::new(8, 24), 0.7, color)?;
        portraits.push(portrait);
    }
    if portraits.is_empty() {
        return Ok(None);
    }
    let mut strip = Mat::default();
    core::hconcat(&portraits, &mut strip)?;
    Ok(Some(strip))
}

fn put_label(
    canvas: &mut Mat,
    text: &str,
    origin: Point,
    scale: f64,
    color: Scalar,
) -> opencv::Result<()> {
    imgproc::put_text(
        canvas,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        color,
        2,
        imgproc::LINE_8,
        false,
    )
}

impl Display for HighGuiDisplay {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> DisplayEvent {
        match self.draw(frame, overlay) {
            Ok(key) if key & 0xff == END_KEY => DisplayEvent::EndRequested,
            Ok(_) => DisplayEvent::None,
            Err(e) => {
                warn!(error = %e, "failed to draw frame");
                DisplayEvent::None
            }
        }
    }

    fn show_standings(&mut self, standings: &Standings, players: &[Player]) {
        if let Err(e) = self.draw_standings(standings, players) {
            warn!(error = %e, "failed to draw standings");
        }
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.window);
    }
}
