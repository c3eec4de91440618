// Binary telemetry schema.
//
// Hand-maintained prost messages for the subset of the vendor's protobuf
// schema the decoder reads. Unknown fields are skipped by prost, so newer
// firmware adding fields does not break decoding.

/// Outer frame published on `/app/device/property/<sn>`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendHeaderMsg {
    #[prost(message, optional, tag = "1")]
    pub msg: ::core::option::Option<Header>,
}

/// Routing header; `pdata` holds the command-specific message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub pdata: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub src: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub dest: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub d_src: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub d_dest: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub enc_type: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "7")]
    pub check_type: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "8")]
    pub cmd_func: ::core::option::Option<i32>,
    /// Selects the `pdata` message type.
    #[prost(int32, optional, tag = "9")]
    pub cmd_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "10")]
    pub data_len: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "11")]
    pub need_ack: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "12")]
    pub is_ack: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "14")]
    pub seq: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "15")]
    pub product_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "16")]
    pub version: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "17")]
    pub payload_ver: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "18")]
    pub time_snap: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "19")]
    pub is_rw_cmd: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "20")]
    pub is_queue: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "21")]
    pub ack_type: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "22")]
    pub code: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "23")]
    pub from: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "24")]
    pub module_sn: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "25")]
    pub device_sn: ::core::option::Option<::prost::alloc::string::String>,
}

/// Micro-inverter heartbeat (command 1).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InverterHeartbeat {
    #[prost(uint32, optional, tag = "1")]
    pub inv_error_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub inv_warning_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub pv1_error_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pv1_warning_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub pv2_error_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub pv2_warning_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub bat_error_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub bat_warning_code: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "11")]
    pub pv1_status: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "12")]
    pub pv2_status: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "13")]
    pub bat_status: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "15")]
    pub inv_status: ::core::option::Option<u32>,
    /// Deci-volts.
    #[prost(int32, optional, tag = "16")]
    pub pv1_input_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "17")]
    pub pv1_op_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "18")]
    pub pv1_input_cur: ::core::option::Option<i32>,
    /// Deci-watts.
    #[prost(int32, optional, tag = "19")]
    pub pv1_input_watts: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "20")]
    pub pv1_temp: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "21")]
    pub pv2_input_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "22")]
    pub pv2_op_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "23")]
    pub pv2_input_cur: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "24")]
    pub pv2_input_watts: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "25")]
    pub pv2_temp: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "26")]
    pub bat_input_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "27")]
    pub bat_op_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "28")]
    pub bat_input_cur: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "29")]
    pub bat_input_watts: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "30")]
    pub bat_temp: ::core::option::Option<i32>,
    #[prost(uint32, optional, tag = "31")]
    pub bat_soc: ::core::option::Option<u32>,
    #[prost(int32, optional, tag = "35")]
    pub inv_input_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "36")]
    pub inv_op_volt: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "37")]
    pub inv_output_cur: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "38")]
    pub inv_output_watts: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "39")]
    pub inv_temp: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "40")]
    pub inv_freq: ::core::option::Option<i32>,
    #[prost(uint32, optional, tag = "46")]
    pub install_country: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "47")]
    pub install_town: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "48")]
    pub permanent_watts: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "49")]
    pub dynamic_watts: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "50")]
    pub supply_priority: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "51")]
    pub lower_limit: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "52")]
    pub upper_limit: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "53")]
    pub inv_on_off: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "56")]
    pub inv_brightness: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "57")]
    pub heartbeat_frequency: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "58")]
    pub rated_power: ::core::option::Option<u32>,
    /// Device clock, Unix seconds.
    #[prost(uint32, optional, tag = "63")]
    pub timestamp: ::core::option::Option<u32>,
}

/// Power-stream history batch (command 32).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PowerPack {
    #[prost(uint32, optional, tag = "1")]
    pub sys_seq: ::core::option::Option<u32>,
    #[prost(message, repeated, tag = "2")]
    pub sys_power_stream: ::prost::alloc::vec::Vec<PowerItem>,
}

/// One power-stream sample.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PowerItem {
    /// Unix seconds.
    #[prost(uint32, optional, tag = "1")]
    pub timestamp: ::core::option::Option<u32>,
    #[prost(sint32, optional, tag = "2")]
    pub timezone: ::core::option::Option<i32>,
    #[prost(uint32, optional, tag = "3")]
    pub inv_to_grid_power: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub inv_to_plug_power: ::core::option::Option<u32>,
    #[prost(int32, optional, tag = "5")]
    pub battery_power: ::core::option::Option<i32>,
    #[prost(uint32, optional, tag = "6")]
    pub pv1_output_power: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub pv2_output_power: ::core::option::Option<u32>,
}
