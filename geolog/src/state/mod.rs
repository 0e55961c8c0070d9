pub mod travelers;
