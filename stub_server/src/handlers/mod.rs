pub mod sound_handlers;
