fn main() {
    qrscan_lib::run()
}
