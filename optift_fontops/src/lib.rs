pub mod font_info;
