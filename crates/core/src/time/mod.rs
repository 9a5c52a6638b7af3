pub mod ir_market;
