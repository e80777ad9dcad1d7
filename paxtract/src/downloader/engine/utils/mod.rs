pub mod ffmpeg_parser;
