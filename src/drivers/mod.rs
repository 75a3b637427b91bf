pub mod ps2_keyboard;
