use crate::types::Screen;

/// Draws one screen on the display surface. Infallible once initialized.
pub trait DisplayRenderer {
    fn draw(&mut self, screen: &Screen<'_>);
}
